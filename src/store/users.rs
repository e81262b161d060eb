use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Username to password hash.
#[derive(Debug, Default)]
pub struct UserStore {
    users: DashMap<String, String>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the user unless the name is taken. Returns `false` on a
    /// duplicate; the check and the insert happen under one shard lock.
    pub fn insert_new(&self, username: &str, password_hash: String) -> bool {
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(password_hash);
                true
            }
        }
    }

    pub fn password_hash(&self, username: &str) -> Option<String> {
        self.users.get(username).map(|hash| hash.clone())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
