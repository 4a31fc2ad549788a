/// Per-user cache of a photo waiting for its edit instruction.
///
/// Operations for one owner are linearizable; a user may send the photo
/// and the instruction in rapid succession from separate handler tasks.
pub trait SessionStore: Send + Sync {
    /// Stores a pending image for the owner, replacing any previous one.
    fn put(&self, owner: i64, bytes: Vec<u8>);

    /// Atomically removes and returns the pending image if it is still
    /// inside the validity window. Stale or absent entries yield `None`;
    /// a stale entry is dropped on the way out.
    fn take_if_fresh(&self, owner: i64) -> Option<Vec<u8>>;

    /// Freshness probe that does not consume the entry.
    fn has_fresh(&self, owner: i64) -> bool;
}
