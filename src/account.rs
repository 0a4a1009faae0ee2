//! Account collaborator interface.
//!
//! The account supplies the moderator policy and the host identity. The
//! conference holds it weakly; a vanished account aborts the operation that
//! needed it.

/// Moderator policy and identity queries consumed by the engine.
pub trait Account: Send + Sync {
    /// Opaque account identifier.
    fn id(&self) -> String;

    /// Username of this account, without domain.
    fn username(&self) -> String;

    /// Full URI of this account as peers should see it.
    fn uri(&self) -> String;

    /// Identifier of the device this account currently runs on.
    fn current_device_id(&self) -> String;

    /// Whether video is enabled for this account.
    fn is_video_enabled(&self) -> bool;

    /// Peer URIs granted moderator rights by configuration.
    fn default_moderators(&self) -> Vec<String>;

    /// Whether every local account username becomes a moderator.
    fn local_moderators_enabled(&self) -> bool;

    /// Whether every joining peer becomes a moderator.
    fn all_moderators_enabled(&self) -> bool;
}
