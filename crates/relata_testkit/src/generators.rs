//! Property-based test generators using proptest.

use crate::fixtures::Member;
use proptest::prelude::*;

/// Strategy for member names.
pub fn member_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{0,11}").expect("Invalid regex")
}

/// Strategy for members with ids in `1..=1000`.
pub fn member_strategy() -> impl Strategy<Value = Member> {
    (1i64..=1000, member_name_strategy(), prop::option::of(0i64..120))
        .prop_map(|(id, name, age)| Member { id, name, age })
}

/// A change applied to a managed member between flushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEdit {
    /// Set the name.
    Rename(String),
    /// Set the age.
    SetAge(Option<i64>),
}

impl MemberEdit {
    /// Applies the edit.
    pub fn apply(&self, member: &mut Member) {
        match self {
            MemberEdit::Rename(name) => member.name = name.clone(),
            MemberEdit::SetAge(age) => member.age = *age,
        }
    }
}

/// Strategy for member edits.
pub fn member_edit_strategy() -> impl Strategy<Value = MemberEdit> {
    prop_oneof![
        member_name_strategy().prop_map(MemberEdit::Rename),
        prop::option::of(0i64..120).prop_map(MemberEdit::SetAge),
    ]
}
