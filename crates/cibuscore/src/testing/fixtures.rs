//! Sample coupons

use chrono::{TimeZone, Utc};

use crate::coupon::Coupon;

/// The coupon of the basic list/use scenario: `cid1`, vendor `v1`, 100 ILS.
pub fn scenario_coupon() -> Coupon {
    Coupon::new("cid1", "v1", 100)
}

/// Three coupons with distinct vendors; two of them dated.
pub fn sample_coupons() -> Vec<Coupon> {
    let date = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single();

    let mut a = Coupon::new("912300001", "Shufersal", 40);
    a.expiration = date(2026, 12, 31);
    let mut b = Coupon::new("912300002", "Rami Levy", 100);
    b.expiration = date(2026, 11, 30);
    let c = Coupon::new("912300003", "Yochananof", 50);

    vec![a, b, c]
}
