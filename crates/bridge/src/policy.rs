//! Channel allow-lists.
//!
//! A policy is the complete trust boundary between the sandboxed UI and
//! the host: every call and every subscription is checked against it, and
//! names are compared exactly (case-sensitive).

use veil_common::error::{VeilError, VeilResult};

pub const ENUMERATE_SOURCES: &str = "enumerate-sources";
pub const BEGIN_CAPTURE: &str = "begin-capture";
pub const END_CAPTURE: &str = "end-capture";
pub const SCREEN_SHARE_STATUS: &str = "screen-share-status";

pub const INSTALL_UPDATE: &str = "install-update";
pub const UPDATE_AVAILABLE: &str = "update-available";
pub const UPDATE_DOWNLOADED: &str = "update-downloaded";

/// Named allow-list for one bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Bridge name, for logs.
    pub name: &'static str,
    /// Channels the UI may invoke (request/response).
    pub invoke: &'static [&'static str],
    /// Channels the UI may subscribe to (host → UI events).
    pub listen: &'static [&'static str],
}

/// Capture lifecycle bridge.
pub const CAPTURE_POLICY: ChannelPolicy = ChannelPolicy {
    name: "capture",
    invoke: &[ENUMERATE_SOURCES, BEGIN_CAPTURE, END_CAPTURE],
    listen: &[SCREEN_SHARE_STATUS],
};

/// Update notification bridge. Disjoint from [`CAPTURE_POLICY`].
pub const UPDATE_POLICY: ChannelPolicy = ChannelPolicy {
    name: "update",
    invoke: &[INSTALL_UPDATE],
    listen: &[UPDATE_AVAILABLE, UPDATE_DOWNLOADED],
};

impl ChannelPolicy {
    pub fn allows_invoke(&self, channel: &str) -> bool {
        self.invoke.iter().any(|c| *c == channel)
    }

    pub fn allows_listen(&self, channel: &str) -> bool {
        self.listen.iter().any(|c| *c == channel)
    }

    pub fn check_invoke(&self, channel: &str) -> VeilResult<()> {
        if self.allows_invoke(channel) {
            Ok(())
        } else {
            tracing::warn!(bridge = self.name, channel, "Rejected unlisted invoke channel");
            Err(VeilError::unauthorized_channel(channel))
        }
    }

    pub fn check_listen(&self, channel: &str) -> VeilResult<()> {
        if self.allows_listen(channel) {
            Ok(())
        } else {
            tracing::warn!(bridge = self.name, channel, "Rejected unlisted event channel");
            Err(VeilError::unauthorized_channel(channel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_policy_is_exact_and_case_sensitive() {
        assert!(CAPTURE_POLICY.allows_invoke("begin-capture"));
        assert!(!CAPTURE_POLICY.allows_invoke("Begin-Capture"));
        assert!(!CAPTURE_POLICY.allows_invoke("begin-capture "));
        assert!(!CAPTURE_POLICY.allows_invoke("get-sources"));
        assert!(matches!(
            CAPTURE_POLICY.check_invoke("start-screen-capture"),
            Err(VeilError::UnauthorizedChannel { channel }) if channel == "start-screen-capture"
        ));
    }

    #[test]
    fn policies_do_not_overlap() {
        for channel in CAPTURE_POLICY.invoke.iter().chain(CAPTURE_POLICY.listen) {
            assert!(!UPDATE_POLICY.allows_invoke(channel));
            assert!(!UPDATE_POLICY.allows_listen(channel));
        }
        for channel in UPDATE_POLICY.invoke.iter().chain(UPDATE_POLICY.listen) {
            assert!(!CAPTURE_POLICY.allows_invoke(channel));
            assert!(!CAPTURE_POLICY.allows_listen(channel));
        }
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_names_outside_the_list_are_rejected(channel in "[a-zA-Z-]{0,24}") {
            let listed = CAPTURE_POLICY.invoke.contains(&channel.as_str());
            proptest::prop_assert_eq!(CAPTURE_POLICY.check_invoke(&channel).is_ok(), listed);
        }
    }

    #[test]
    fn invoke_and_listen_lists_are_separate() {
        assert!(CAPTURE_POLICY.check_listen(SCREEN_SHARE_STATUS).is_ok());
        assert!(CAPTURE_POLICY.check_invoke(SCREEN_SHARE_STATUS).is_err());
        assert!(CAPTURE_POLICY.check_listen(END_CAPTURE).is_err());
    }
}
