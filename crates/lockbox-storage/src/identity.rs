use std::env;

/// Local machine and user names. They salt the master secret and derive the
/// fallback backend keypair, so changing either orphans existing records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub machine: String,
    pub user: String,
}

impl DeviceIdentity {
    pub fn new(machine: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            user: user.into(),
        }
    }

    /// Identity of the running process: host name and login user.
    pub fn current() -> Self {
        let machine = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-device".to_string());
        let user = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".to_string());
        Self { machine, user }
    }
}
