//! Kiosk session: the state behind one ordering screen.
//!
//! Owns the catalog snapshot, the cart, the current totals, and who is
//! signed in (customer and employee). The presentation layer drives it
//! through these methods and renders what they return.
//!
//! Submission is split in two so the screen can keep rendering while the
//! request is outstanding:
//!
//! 1. [`KioskSession::begin_submission`] snapshots the request and totals
//!    and marks the session busy. A second call fails until the first is
//!    completed.
//! 2. [`KioskSession::complete_submission`] takes the gateway outcome. On
//!    success the loyalty balance is settled from the snapshot and the
//!    order is reset; on failure the cart and discount are left as they
//!    were so the order can be retried. A pending value that is not the
//!    one in flight (stale or already completed) is rejected untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cart::CartLedger;
use crate::catalog::{Catalog, CatalogCounts, CatalogSource, Review};
use crate::config::KioskConfig;
use crate::customization::{CustomizationSession, CustomizedProduct};
use crate::error::{KioskError, KioskResult};
use crate::loyalty::{self, Customer};
use crate::order::{self, OrderGateway, OrderReceipt, OrderRequest, PendingSubmission};
use crate::pricing::{PricingEngine, Totals};
use crate::reviews::{self, ReviewGateway};

/// Signed-in staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug)]
pub struct KioskSession {
    engine: PricingEngine,
    default_employee_id: Option<String>,
    catalog: Catalog,
    cart: CartLedger,
    totals: Totals,
    customer: Option<Customer>,
    employee: Option<Employee>,
    in_flight: Option<Uuid>,
}

impl KioskSession {
    pub fn new(config: &KioskConfig) -> Self {
        Self::with_engine(config.pricing_engine(), config.employee_id.clone())
    }

    pub fn with_engine(engine: PricingEngine, default_employee_id: Option<String>) -> Self {
        Self {
            engine,
            default_employee_id,
            catalog: Catalog::default(),
            cart: CartLedger::new(),
            totals: Totals::zero(),
            customer: None,
            employee: None,
            in_flight: None,
        }
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub async fn refresh_catalog<S: CatalogSource>(&mut self, source: &S) -> KioskResult<CatalogCounts> {
        self.catalog.refresh(source).await
    }

    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Open the customization screen for a product. `None` if the product
    /// is not in the catalog.
    pub fn customize(&self, product_id: &str) -> Option<CustomizationSession> {
        let product = self.catalog.product(product_id)?;
        Some(CustomizationSession::open(product, self.catalog.ingredients()))
    }

    // -----------------------------------------------------------------------
    // Who is signed in
    // -----------------------------------------------------------------------

    pub fn sign_in_customer(&mut self, customer: Customer) {
        info!(customer_id = %customer.id, points = customer.points, "customer signed in");
        self.customer = Some(customer);
    }

    /// Sign the customer out. A discount redeemed against their points is
    /// dropped with them.
    pub fn sign_out_customer(&mut self) -> Option<Customer> {
        let customer = self.customer.take();
        if customer.is_some() && self.totals.has_discount() {
            self.totals.discount = rust_decimal::Decimal::ZERO;
            debug!("discount cleared on customer sign-out");
        }
        customer
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn set_employee(&mut self, employee: Option<Employee>) {
        self.employee = employee;
    }

    pub fn employee(&self) -> Option<&Employee> {
        self.employee.as_ref()
    }

    fn employee_id(&self) -> KioskResult<String> {
        self.employee
            .as_ref()
            .map(|e| e.id.clone())
            .or_else(|| self.default_employee_id.clone())
            .ok_or(KioskError::MissingEmployee)
    }

    // -----------------------------------------------------------------------
    // Cart + totals
    // -----------------------------------------------------------------------

    pub fn cart(&self) -> &CartLedger {
        &self.cart
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.engine
    }

    pub fn add_to_cart(&mut self, item: CustomizedProduct) -> &Totals {
        let product_id = item.product_id.clone();
        self.cart = self.cart.append(item);
        debug!(product_id = %product_id, lines = self.cart.len(), "line added to cart");
        self.totals = self.engine.recompute(&self.cart, &self.totals);
        &self.totals
    }

    /// Cancel the order: empty cart, zero totals.
    pub fn reset_order(&mut self) {
        self.cart = self.cart.reset();
        self.totals = self.engine.recompute(&self.cart, &self.totals);
        debug!(lines = self.cart.len(), "order reset");
    }

    /// Redeem the signed-in customer's points against the current order.
    pub fn apply_loyalty_discount(&mut self) -> &Totals {
        if self.cart.is_empty() {
            return &self.totals;
        }
        self.totals = self
            .engine
            .apply_loyalty_discount(self.customer.as_ref(), &self.totals);
        if self.totals.has_discount() {
            info!(discount = %self.totals.discount, "loyalty discount applied");
        }
        &self.totals
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_submission(&mut self) -> KioskResult<PendingSubmission> {
        if self.in_flight.is_some() {
            return Err(KioskError::SubmissionInProgress);
        }
        let employee_id = self.employee_id()?;
        let request = OrderRequest::from_cart(
            &self.cart,
            &self.totals,
            &employee_id,
            self.customer.as_ref(),
        )?;

        let pending = PendingSubmission::new(request, self.totals, self.customer.clone());
        self.in_flight = Some(pending.submission_id);
        info!(
            submission_id = %pending.submission_id,
            lines = self.cart.len(),
            total = %pending.request.total,
            discount = %pending.request.discount,
            "order submission started"
        );
        Ok(pending)
    }

    pub fn complete_submission(
        &mut self,
        pending: PendingSubmission,
        outcome: KioskResult<Value>,
    ) -> KioskResult<OrderReceipt> {
        if self.in_flight != Some(pending.submission_id) {
            warn!(
                submission_id = %pending.submission_id,
                "rejecting completion for a submission that is not in flight"
            );
            return Err(KioskError::UnknownSubmission(pending.submission_id));
        }
        self.in_flight = None;

        let ack = match outcome {
            Ok(ack) => ack,
            Err(e) => {
                warn!(submission_id = %pending.submission_id, error = %e, "order submission failed");
                return Err(e);
            }
        };

        let settlement = loyalty::settle(pending.customer.as_ref(), &pending.totals);
        if let (Some(current), Some(submitted)) = (self.customer.as_mut(), pending.customer.as_ref()) {
            if current.id == submitted.id {
                loyalty::apply(current, &settlement);
            }
        }

        self.reset_order();

        let receipt = OrderReceipt {
            order_id: order::order_id_from_ack(&ack),
            submission_id: pending.submission_id,
            submitted_at: pending.started_at,
            totals: pending.totals,
            settlement,
        };
        info!(
            submission_id = %receipt.submission_id,
            order_id = receipt.order_id.as_deref().unwrap_or("unknown"),
            "order submitted"
        );
        Ok(receipt)
    }

    /// Submit the current order through `gateway` and settle loyalty points.
    pub async fn submit_order<G: OrderGateway>(&mut self, gateway: &G) -> KioskResult<OrderReceipt> {
        let pending = self.begin_submission()?;
        let outcome = gateway
            .submit_order(&pending.request, &pending.idempotency_key())
            .await;
        self.complete_submission(pending, outcome)
    }

    // -----------------------------------------------------------------------
    // Reviews
    // -----------------------------------------------------------------------

    pub async fn post_review<G: ReviewGateway>(
        &mut self,
        gateway: &G,
        product_id: &str,
        text: &str,
    ) -> KioskResult<Review> {
        reviews::post_review(gateway, &mut self.catalog, self.customer.as_ref(), product_id, text).await
    }

    pub async fn delete_review<G: ReviewGateway>(&mut self, gateway: &G, review_id: &str) -> KioskResult<()> {
        reviews::delete_review(gateway, &mut self.catalog, self.customer.as_ref(), review_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::catalog::tests::{ingredient, product};
    use crate::customization::SizeTier;
    use crate::loyalty::Settlement;
    use crate::pricing::DiscountPolicy;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeOrders {
        sent: Mutex<Vec<(OrderRequest, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl OrderGateway for FakeOrders {
        async fn submit_order(&self, request: &OrderRequest, key: &str) -> KioskResult<Value> {
            self.sent
                .lock()
                .unwrap()
                .push((request.clone(), key.to_string()));
            if self.fail {
                return Err(KioskError::Http {
                    status: 500,
                    message: "Something went wrong!".into(),
                });
            }
            Ok(json!({ "data": { "id": "order-1", "total": request.total } }))
        }
    }

    fn session() -> KioskSession {
        let mut s = KioskSession::with_engine(PricingEngine::default(), Some("e-default".into()));
        s.set_catalog(Catalog::new(
            vec![
                product("tea", dec!(4.00), &["i-boba"]),
                product("slush", dec!(6.00), &[]),
                product("coffee", dec!(8.00), &[]),
            ],
            vec![ingredient("i-boba", "Boba"), ingredient("i-jelly", "Jelly")],
        ));
        s
    }

    fn customer(points: u64) -> Customer {
        Customer {
            id: "c1".into(),
            name: "Morgan".into(),
            points,
            picture: None,
        }
    }

    fn add(s: &mut KioskSession, product_id: &str) {
        let item = s.customize(product_id).unwrap().finalize();
        s.add_to_cart(item);
    }

    #[test]
    fn test_customize_unknown_product() {
        assert!(session().customize("nope").is_none());
    }

    #[test]
    fn test_add_to_cart_recomputes_totals() {
        let mut s = session();
        let mut c = s.customize("tea").unwrap();
        c.select_size(SizeTier::Large);
        c.toggle_topping("i-jelly");
        let totals = *s.add_to_cart(c.finalize());

        assert_eq!(totals.subtotal, dec!(6.00));
        assert_eq!(s.cart().len(), 1);
        let ids: Vec<&str> = s.cart().lines()[0].ingredient_ids().collect();
        assert_eq!(ids, vec!["i-boba", "i-jelly"]);
        // catalog untouched
        assert_eq!(s.catalog().product("tea").unwrap().price, dec!(4.00));
    }

    #[test]
    fn test_reset_after_three_appends() {
        let mut s = session();
        add(&mut s, "tea");
        add(&mut s, "tea");
        add(&mut s, "slush");
        s.sign_in_customer(customer(30));
        s.apply_loyalty_discount();
        assert!(s.totals().has_discount());

        s.reset_order();
        assert_eq!(s.cart().len(), 0);
        assert_eq!(*s.totals(), Totals::zero());
    }

    #[test]
    fn test_discount_requires_customer_and_cart() {
        let mut s = session();
        s.sign_in_customer(customer(100));
        assert_eq!(*s.apply_loyalty_discount(), Totals::zero());

        let mut guest = session();
        add(&mut guest, "tea");
        assert!(!guest.apply_loyalty_discount().has_discount());
    }

    #[test]
    fn test_sign_out_clears_discount() {
        let mut s = session();
        add(&mut s, "tea");
        s.sign_in_customer(customer(20));
        s.apply_loyalty_discount();
        assert_eq!(s.totals().discount, dec!(2));
        assert!(s.sign_out_customer().is_some());
        assert_eq!(s.totals().discount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_submit_accrues_points() {
        let mut s = session();
        s.sign_in_customer(customer(0));
        add(&mut s, "tea");
        add(&mut s, "slush");
        assert_eq!(s.totals().gross_total, dec!(10.825));

        let gateway = FakeOrders::default();
        let receipt = s.submit_order(&gateway).await.unwrap();

        assert_eq!(receipt.order_id.as_deref(), Some("order-1"));
        assert_eq!(receipt.settlement.balance(), Some(11));
        assert_eq!(s.customer().unwrap().points, 11);
        assert!(s.cart().is_empty());
        assert!(!s.is_submitting());

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.employee_id, "e-default");
        assert_eq!(sent[0].0.products, vec!["tea", "slush"]);
        assert_eq!(sent[0].0.ingredients, vec!["i-boba"]);
        assert_eq!(sent[0].0.customer.as_deref(), Some("c1"));
        assert!(sent[0].1.starts_with("order:"));
    }

    #[tokio::test]
    async fn test_submit_with_redemption_wipes_points() {
        let engine = PricingEngine::new(Decimal::ZERO, DiscountPolicy::Sticky);
        let mut s = KioskSession::with_engine(engine, Some("e1".into()));
        s.set_catalog(Catalog::new(vec![product("p8", dec!(8.00), &[])], vec![]));
        s.sign_in_customer(customer(50));
        add(&mut s, "p8");
        s.apply_loyalty_discount();
        assert_eq!(s.totals().discount, dec!(5.00));
        assert_eq!(s.totals().final_total(), dec!(3.00));

        let receipt = s.submit_order(&FakeOrders::default()).await.unwrap();
        assert_eq!(receipt.settlement, Settlement::Wiped { previous: 50 });
        assert_eq!(s.customer().unwrap().points, 0);
    }

    #[tokio::test]
    async fn test_guest_submission_has_no_settlement() {
        let mut s = session();
        add(&mut s, "coffee");
        let receipt = s.submit_order(&FakeOrders::default()).await.unwrap();
        assert_eq!(receipt.settlement, Settlement::Guest);
        assert!(s.customer().is_none());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart_and_points() {
        let mut s = session();
        s.sign_in_customer(customer(40));
        add(&mut s, "coffee");
        s.apply_loyalty_discount();
        let before = *s.totals();

        let gateway = FakeOrders {
            fail: true,
            ..Default::default()
        };
        let err = s.submit_order(&gateway).await.unwrap_err();
        assert!(matches!(err, KioskError::Http { status: 500, .. }));
        assert_eq!(s.cart().len(), 1);
        assert_eq!(*s.totals(), before);
        assert_eq!(s.customer().unwrap().points, 40);
        assert!(!s.is_submitting());
    }

    #[test]
    fn test_second_submission_rejected_while_in_flight() {
        let mut s = session();
        add(&mut s, "tea");
        let pending = s.begin_submission().unwrap();
        assert!(s.is_submitting());
        assert!(matches!(
            s.begin_submission(),
            Err(KioskError::SubmissionInProgress)
        ));

        s.complete_submission(pending, Ok(Value::Null)).unwrap();
        assert!(!s.is_submitting());
    }

    #[test]
    fn test_settlement_uses_submitted_totals_not_late_cart() {
        let mut s = session();
        s.sign_in_customer(customer(0));
        add(&mut s, "tea");
        let pending = s.begin_submission().unwrap();

        // cart changes while the request is outstanding
        add(&mut s, "coffee");
        add(&mut s, "coffee");

        let receipt = s.complete_submission(pending, Ok(json!({}))).unwrap();
        // 4.00 * 1.0825 = 4.33 -> 5 points
        assert_eq!(receipt.settlement.balance(), Some(5));
        assert_eq!(receipt.order_id, None);
        assert_eq!(s.customer().unwrap().points, 5);
    }

    #[test]
    fn test_empty_cart_and_missing_employee_rejected() {
        let mut s = session();
        assert!(matches!(s.begin_submission(), Err(KioskError::EmptyCart)));
        assert!(!s.is_submitting());

        let mut s = KioskSession::with_engine(PricingEngine::default(), None);
        s.set_catalog(Catalog::new(vec![product("tea", dec!(4), &[])], vec![]));
        add(&mut s, "tea");
        assert!(matches!(s.begin_submission(), Err(KioskError::MissingEmployee)));

        s.set_employee(Some(Employee {
            id: "e-9".into(),
            name: "Casey".into(),
            is_manager: false,
        }));
        assert_eq!(s.begin_submission().unwrap().request.employee_id, "e-9");
    }

    #[test]
    fn test_duplicate_completion_is_rejected() {
        let mut s = session();
        s.sign_in_customer(customer(0));
        add(&mut s, "tea");
        let pending = s.begin_submission().unwrap();
        let copy = pending.clone();

        s.complete_submission(pending, Ok(Value::Null)).unwrap();
        assert_eq!(s.customer().unwrap().points, 5);

        add(&mut s, "coffee");
        let err = s.complete_submission(copy, Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, KioskError::UnknownSubmission(_)));
        assert_eq!(s.customer().unwrap().points, 5);
        assert_eq!(s.cart().len(), 1);
    }

    #[test]
    fn test_stale_completion_leaves_newer_submission_in_flight() {
        let mut s = session();
        s.sign_in_customer(customer(0));
        add(&mut s, "tea");
        let first = s.begin_submission().unwrap();
        let stale = first.clone();
        let failed = s.complete_submission(
            first,
            Err(KioskError::Network("Connection timed out".into())),
        );
        assert!(failed.is_err());

        let second = s.begin_submission().unwrap();
        let err = s.complete_submission(stale, Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, KioskError::UnknownSubmission(id) if id != second.submission_id));
        assert!(s.is_submitting());
        assert!(matches!(s.begin_submission(), Err(KioskError::SubmissionInProgress)));
        assert_eq!(s.cart().len(), 1);
        assert_eq!(s.customer().unwrap().points, 0);

        s.complete_submission(second, Ok(Value::Null)).unwrap();
        assert_eq!(s.customer().unwrap().points, 5);
        assert!(!s.is_submitting());
    }

    #[tokio::test]
    async fn test_customer_switch_mid_flight_does_not_credit_new_customer() {
        let mut s = session();
        s.sign_in_customer(customer(0));
        add(&mut s, "tea");
        let pending = s.begin_submission().unwrap();

        s.sign_out_customer();
        s.sign_in_customer(Customer {
            id: "c2".into(),
            name: "Other".into(),
            points: 7,
            picture: None,
        });

        let receipt = s.complete_submission(pending, Ok(Value::Null)).unwrap();
        assert_eq!(receipt.settlement.balance(), Some(5));
        assert_eq!(s.customer().unwrap().points, 7);
    }
}
