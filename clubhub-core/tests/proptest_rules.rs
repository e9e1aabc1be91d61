use chrono::{DateTime, Duration, Utc};
use clubhub_core::{
    check_removal, check_role_change, close_session, force_close, round_hours, Caller, ClubRole,
    MembershipStatus, SessionClose,
};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = ClubRole> {
    prop_oneof![
        Just(ClubRole::Member),
        Just(ClubRole::Advisor),
        Just(ClubRole::Leader),
    ]
}

fn arb_caller() -> impl Strategy<Value = Caller> {
    prop_oneof![
        Just(Caller::Admin),
        Just(Caller::Outsider),
        arb_role().prop_map(Caller::Member),
    ]
}

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

proptest! {
    /// Property: a non-admin never grants a level above their own
    #[test]
    fn prop_no_grant_above_self(mine in arb_role(), current in arb_role(), requested in arb_role(), is_self in any::<bool>()) {
        if check_role_change(Caller::Member(mine), current, requested, is_self).is_ok() {
            prop_assert!(requested <= mine);
            prop_assert!(requested != ClubRole::Leader);
        }
    }

    /// Property: a non-admin never modifies someone at or above their level
    #[test]
    fn prop_target_strictly_below_unless_self(mine in arb_role(), current in arb_role(), requested in arb_role()) {
        if check_role_change(Caller::Member(mine), current, requested, false).is_ok() {
            prop_assert!(current < mine);
        }
    }

    /// Property: admins may perform every role change
    #[test]
    fn prop_admin_changes_anything(current in arb_role(), requested in arb_role(), is_self in any::<bool>()) {
        prop_assert!(check_role_change(Caller::Admin, current, requested, is_self).is_ok());
    }

    /// Property: the leader can never be removed, whoever asks
    #[test]
    fn prop_leader_never_removed(caller in arb_caller()) {
        prop_assert!(check_removal(caller, ClubRole::Leader).is_err());
    }

    /// Property: removal by a member implies a strictly higher level
    #[test]
    fn prop_removal_needs_higher_level(mine in arb_role(), target in arb_role()) {
        if check_removal(Caller::Member(mine), target).is_ok() {
            prop_assert!(mine.level() > target.level());
        }
    }

    /// Property: status text parses back to the same variant
    #[test]
    fn prop_membership_status_text(idx in 0usize..4) {
        let status = MembershipStatus::ALL[idx];
        prop_assert_eq!(status.to_string().parse::<MembershipStatus>().unwrap(), status);
    }

    /// Property: sessions under a minute are discarded, others kept
    #[test]
    fn prop_minimum_session(ms in -86_400_000i64..86_400_000) {
        let start = base();
        let end = start + Duration::milliseconds(ms);
        match close_session(start, end) {
            SessionClose::Discard => prop_assert!(ms < 60_000),
            SessionClose::Complete { minutes, hours } => {
                prop_assert!(ms >= 60_000);
                prop_assert_eq!(minutes, ms / 60_000);
                prop_assert!(hours >= 0.02);
            }
        }
    }

    /// Property: stored hours have at most two decimals and stay within half a hundredth
    #[test]
    fn prop_hours_rounded_to_two_decimals(ms in 0i64..(30 * 86_400_000)) {
        let exact = ms as f64 / 3_600_000.0;
        let rounded = round_hours(exact);
        prop_assert!((rounded - exact).abs() <= 0.005 + 1e-9);
        let cents = rounded * 100.0;
        prop_assert!((cents - cents.round()).abs() < 1e-6);
    }

    /// Property: forced close never discards and never goes negative
    #[test]
    fn prop_force_close_complete(ms in -86_400_000i64..86_400_000) {
        let start = base();
        match force_close(start, start + Duration::milliseconds(ms)) {
            SessionClose::Complete { minutes, hours } => {
                prop_assert!(minutes >= 0);
                prop_assert!(hours >= 0.0);
            }
            SessionClose::Discard => prop_assert!(false, "force close discarded"),
        }
    }
}
