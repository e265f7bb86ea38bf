//! Per-session client state.
//!
//! A [`ClientSessionState`] lives exactly as long as the [`crate::orchestrator::JobsClient`]
//! that owns it: created when the view mounts, dropped when it unmounts.
//! Nothing here is persisted.

use privy_jobs_contract::Handle;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientSessionState {
    /// Job id of the last submission attempt.
    pub tracked_job_id: Option<u32>,
    pub busy: bool,
    pub decrypting: bool,
    pub status: String,
    /// Last handle read back from the contract for the connected account.
    pub stored_handle: Option<Handle>,
    pub decrypted_job_id: Option<u32>,
}

impl ClientSessionState {
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Whether the stored handle is a real ciphertext rather than the
    /// empty-slot sentinel.
    pub fn already_applied(&self) -> bool {
        self.stored_handle.is_some_and(|handle| !handle.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_handles_are_not_applications() {
        let mut state = ClientSessionState::default();
        assert!(!state.already_applied());

        for sentinel in ["0x0000000000000000000000000000000000000000000000000000000000000000", "0x", "0x0"] {
            state.stored_handle = Some(Handle::parse_loose(sentinel).unwrap());
            assert!(!state.already_applied(), "{sentinel}");
        }

        state.stored_handle = Some(Handle::from([9u8; 32]));
        assert!(state.already_applied());
    }
}
