//! Property-based tests for storefront invariants.
//!
//! These use proptest to verify the pure helpers that catalog validation,
//! checkout totals and pagination depend on across a wide range of inputs.

use pepstore_api::config::AppConfig;
use pepstore_api::handlers::common::{PaginationMeta, PaginationParams};
use pepstore_api::services::carts::CartTotals;
use pepstore_api::services::catalog::is_valid_sku;
use pepstore_api::services::orders::generate_order_number;
use proptest::prelude::*;
use rust_decimal::Decimal;

// Strategies for generating test data
fn sku_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{2,6}-[0-9]{2,6}".prop_map(|s| s)
}

fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000, 0i64..100).prop_map(|(units, cents)| Decimal::new(units * 100 + cents, 2))
}

fn tax_rate_strategy() -> impl Strategy<Value = Decimal> {
    // 0% to 25% in basis points
    (0i64..=2_500).prop_map(|bp| Decimal::new(bp, 4))
}

fn test_config() -> AppConfig {
    AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        8080,
        "test".to_string(),
    )
}

// Property: SKU validation accepts the documented shape and nothing else
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn well_formed_skus_pass(sku in sku_strategy()) {
        prop_assert!(is_valid_sku(&sku), "Well-formed SKU rejected: {}", sku);
    }

    #[test]
    fn lowercase_skus_fail(sku in "[a-z]{2,6}-[0-9]{2,6}") {
        prop_assert!(!is_valid_sku(&sku), "Lowercase SKU accepted: {}", sku);
    }

    #[test]
    fn skus_without_a_separator_fail(sku in "[A-Z]{2,6}[0-9]{2,6}") {
        prop_assert!(!is_valid_sku(&sku), "SKU without a dash accepted: {}", sku);
    }

    #[test]
    fn oversized_prefixes_fail(sku in "[A-Z]{7,12}-[0-9]{2,6}") {
        prop_assert!(!is_valid_sku(&sku), "Oversized SKU prefix accepted: {}", sku);
    }
}

// Property: Generated order numbers keep their public shape
proptest! {
    #[test]
    fn order_numbers_have_the_documented_shape(_seed in any::<u64>()) {
        let number = generate_order_number();
        prop_assert!(number.starts_with("PEP-"), "Bad prefix: {}", number);
        prop_assert_eq!(number.len(), 14, "Bad length: {}", &number);
        prop_assert!(
            number[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "Suffix is not uppercase alphanumeric: {}",
            number
        );
    }
}

// Property: Cart totals arithmetic
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn totals_are_the_sum_of_their_parts(
        subtotal in money_strategy(),
        threshold in money_strategy(),
        flat_rate in money_strategy(),
        tax_rate in tax_rate_strategy(),
    ) {
        let totals = CartTotals::compute(subtotal, false, threshold, flat_rate, tax_rate);
        prop_assert_eq!(totals.total, totals.subtotal + totals.shipping + totals.tax);
        prop_assert!(totals.tax >= Decimal::ZERO, "Negative tax: {}", totals.tax);
        // Tax is always rounded to cents
        prop_assert_eq!(totals.tax, totals.tax.round_dp(2));
    }

    #[test]
    fn shipping_is_flat_below_the_threshold_and_free_above(
        subtotal in money_strategy(),
        threshold in money_strategy(),
        flat_rate in money_strategy(),
        tax_rate in tax_rate_strategy(),
    ) {
        let totals = CartTotals::compute(subtotal, false, threshold, flat_rate, tax_rate);
        if subtotal >= threshold {
            prop_assert_eq!(totals.shipping, Decimal::ZERO);
        } else {
            prop_assert_eq!(totals.shipping, flat_rate);
        }
    }

    #[test]
    fn empty_carts_owe_nothing(
        threshold in money_strategy(),
        flat_rate in money_strategy(),
        tax_rate in tax_rate_strategy(),
    ) {
        let totals = CartTotals::compute(Decimal::ZERO, true, threshold, flat_rate, tax_rate);
        prop_assert_eq!(totals.shipping, Decimal::ZERO);
        prop_assert_eq!(totals.total, Decimal::ZERO);
    }
}

// Property: Pagination metadata covers every row exactly once
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn page_counts_cover_the_total(
        page in 1u64..1_000,
        per_page in 1u64..=100,
        total in 0u64..100_000,
    ) {
        let meta = PaginationMeta::new(page, per_page, total);
        prop_assert!(
            meta.total_pages * meta.per_page >= meta.total,
            "Pages do not cover total: {} pages x {} < {}",
            meta.total_pages, meta.per_page, meta.total
        );
        if meta.total == 0 {
            prop_assert_eq!(meta.total_pages, 0);
        } else {
            // The last page is not empty
            prop_assert!((meta.total_pages - 1) * meta.per_page < meta.total);
        }
    }

    #[test]
    fn clamped_params_stay_inside_configured_bounds(
        page in 0u64..10_000,
        per_page in 0u64..10_000,
    ) {
        let config = test_config();
        let params = PaginationParams { page, per_page };
        let (page, per_page) = params.clamped(&config);
        prop_assert!(page >= 1, "Page clamped below one: {}", page);
        prop_assert!(
            (1..=config.api_max_page_size as u64).contains(&per_page),
            "Per-page out of bounds: {}",
            per_page
        );
    }
}
