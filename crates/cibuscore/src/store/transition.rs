//! The redemption decision table.
//!
//! | in "used" | in "new" | transition |
//! |-----------|----------|------------|
//! | no        | no       | `NotExist` |
//! | no        | yes      | `Redeem`: copy new→used, then delete new |
//! | yes       | no       | `AlreadyUsed` |
//! | yes       | yes      | `Heal`: delete the stale new copy, answer `AlreadyUsed` |
//!
//! Presence in "used" is what makes a coupon redeemed. A copy that succeeded
//! followed by a delete that did not leaves the last row behind; the next
//! call lands there and removes the leftover.

/// What a `use` call has to do given the two existence checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NotExist,
    Redeem,
    AlreadyUsed,
    Heal,
}

pub fn resolve(in_used: bool, in_new: bool) -> Transition {
    match (in_used, in_new) {
        (false, false) => Transition::NotExist,
        (false, true) => Transition::Redeem,
        (true, false) => Transition::AlreadyUsed,
        (true, true) => Transition::Heal,
    }
}
