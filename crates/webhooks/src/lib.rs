//! `stockwell-webhooks` — provider callback adapters.
//!
//! Stripe, PayPal and the synthetic COD flow each deliver "a payment
//! happened" in their own dialect. The adapters here verify authenticity and
//! normalize every dialect into one [`PaymentEvent`], keeping the reconciler
//! provider-agnostic.

pub mod cod;
pub mod event;
pub mod paypal;
pub mod stripe;

pub use cod::CodAdapter;
pub use event::{PaymentEvent, PaymentOutcome, WebhookError};
pub use paypal::PaypalAdapter;
pub use stripe::StripeAdapter;
