use std::collections::{BTreeMap, BTreeSet};

use crate::error::ChatError;

/// Named groups of nicknames. Membership is fixed when a group is created and
/// does not depend on who is currently connected.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `name` from the proposed members that are currently `online`,
    /// plus the creator when it has a nickname. Returns the stored members.
    pub fn create(
        &mut self,
        name: &str,
        proposed: &[String],
        creator: Option<&str>,
        online: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidRequest("group name must not be empty".into()));
        }
        if proposed.is_empty() {
            return Err(ChatError::InvalidRequest("group needs at least one member".into()));
        }
        if self.groups.contains_key(name) {
            return Err(ChatError::DuplicateGroup(name.to_string()));
        }

        let mut members: BTreeSet<String> = proposed
            .iter()
            .filter(|nick| online.contains(nick.as_str()))
            .cloned()
            .collect();
        if let Some(creator) = creator {
            members.insert(creator.to_string());
        }

        if members.is_empty() {
            return Err(ChatError::NoValidMembers(name.to_string()));
        }

        self.groups.insert(name.to_string(), members.clone());
        Ok(members)
    }

    /// Names of every group `nickname` belongs to, sorted.
    pub fn groups_containing(&self, nickname: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(nickname))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn members_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(name)
    }

    pub fn is_member(&self, name: &str, nickname: &str) -> bool {
        self.groups
            .get(name)
            .is_some_and(|members| members.contains(nickname))
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn offline_members_dropped_and_creator_added() {
        let mut groups = GroupRegistry::new();
        let members = groups
            .create("G", &names(&["x", "y"]), Some("z"), &online(&["x", "z"]))
            .unwrap();

        assert_eq!(members, online(&["x", "z"]));
        assert!(groups.is_member("G", "x"));
        assert!(groups.is_member("G", "z"));
        assert!(!groups.is_member("G", "y"));
    }

    #[test]
    fn duplicate_name_leaves_registry_unchanged() {
        let mut groups = GroupRegistry::new();
        groups
            .create("G", &names(&["x"]), Some("z"), &online(&["x", "z"]))
            .unwrap();

        let err = groups
            .create("G", &names(&["w"]), Some("w"), &online(&["w"]))
            .unwrap_err();
        assert_eq!(err, ChatError::DuplicateGroup("G".into()));
        assert_eq!(groups.members_of("G"), Some(&online(&["x", "z"])));
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn empty_name_or_member_list_is_invalid() {
        let mut groups = GroupRegistry::new();
        let all = online(&["x"]);

        assert!(matches!(
            groups.create("  ", &names(&["x"]), Some("x"), &all),
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(matches!(
            groups.create("G", &[], Some("x"), &all),
            Err(ChatError::InvalidRequest(_))
        ));
        assert!(groups.is_empty());
    }

    #[test]
    fn nobody_online_without_named_creator_fails() {
        let mut groups = GroupRegistry::new();
        let err = groups
            .create("G", &names(&["ghost"]), None, &online(&[]))
            .unwrap_err();
        assert_eq!(err, ChatError::NoValidMembers("G".into()));
        assert!(groups.members_of("G").is_none());
    }

    #[test]
    fn creator_alone_is_enough() {
        let mut groups = GroupRegistry::new();
        let members = groups
            .create("solo", &names(&["ghost"]), Some("ann"), &online(&["ann"]))
            .unwrap();
        assert_eq!(members, online(&["ann"]));
    }

    #[test]
    fn groups_containing_lists_sorted_names() {
        let mut groups = GroupRegistry::new();
        let all = online(&["ann", "bob"]);
        groups.create("zeta", &names(&["bob"]), Some("ann"), &all).unwrap();
        groups.create("alpha", &names(&["ann"]), Some("ann"), &all).unwrap();

        assert_eq!(groups.groups_containing("ann"), names(&["alpha", "zeta"]));
        assert_eq!(groups.groups_containing("bob"), names(&["zeta"]));
        assert!(groups.groups_containing("cat").is_empty());

        groups.clear();
        assert!(groups.groups_containing("ann").is_empty());
    }
}
