//! Terminal session: decide whether the system clipboard is reachable directly.

/// Session facts that gate the privileged clipboard path
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    pub display: Option<String>,
    pub wayland_display: Option<String>,
    pub ssh_connection: Option<String>,
    pub ssh_tty: Option<String>,
}

impl SessionIdentity {
    /// Whether this session qualifies for direct clipboard writes.
    ///
    /// Remote shells never do, even with X forwarding: the clipboard written
    /// would belong to the remote host.
    pub fn is_secure_context(&self) -> bool {
        if is_set(&self.ssh_connection) || is_set(&self.ssh_tty) {
            return false;
        }
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            return true;
        }
        is_set(&self.display) || is_set(&self.wayland_display)
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Read the current session identity from the environment
pub fn current_session_identity() -> SessionIdentity {
    SessionIdentity {
        display: std::env::var("DISPLAY").ok(),
        wayland_display: std::env::var("WAYLAND_DISPLAY").ok(),
        ssh_connection: std::env::var("SSH_CONNECTION").ok(),
        ssh_tty: std::env::var("SSH_TTY").ok(),
    }
}

pub fn is_graphical_session() -> bool {
    current_session_identity().is_secure_context()
}
