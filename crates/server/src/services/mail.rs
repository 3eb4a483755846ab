//! Transactional email.
//!
//! Messages are rendered from Askama templates (plain text and HTML) and
//! delivered over SMTP via lettre on a background task, so a slow or broken
//! mail server never fails the request that triggered the email. Without SMTP
//! configuration the service is disabled and only logs what it would send.

use std::sync::Arc;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use crate::config::EmailConfig;
use crate::models::order::Order;
use crate::models::quote::{QuoteDetail, QuoteItem};
use crate::models::user::User;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// One line of a quote as shown in emails.
#[derive(Debug, Clone)]
pub struct MailLine {
    pub name: String,
    pub part_number: String,
    pub quantity: i32,
    pub unit_price: String,
    pub line_total: String,
}

impl From<&QuoteItem> for MailLine {
    fn from(item: &QuoteItem) -> Self {
        Self {
            name: item.product_name.clone(),
            part_number: item.part_number.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price.map(|p| p.to_string()).unwrap_or_default(),
            line_total: item.line_total().map(|t| t.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_received.html")]
struct QuoteReceivedHtml<'a> {
    name: &'a str,
    reference: &'a str,
    lines: &'a [MailLine],
    quote_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_received.txt")]
struct QuoteReceivedText<'a> {
    name: &'a str,
    reference: &'a str,
    lines: &'a [MailLine],
    quote_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_staff_notice.html")]
struct QuoteStaffNoticeHtml<'a> {
    reference: &'a str,
    contact_name: &'a str,
    contact_email: &'a str,
    vehicle_info: &'a str,
    notes: &'a str,
    lines: &'a [MailLine],
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_staff_notice.txt")]
struct QuoteStaffNoticeText<'a> {
    reference: &'a str,
    contact_name: &'a str,
    contact_email: &'a str,
    vehicle_info: &'a str,
    notes: &'a str,
    lines: &'a [MailLine],
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_ready.html")]
struct QuoteReadyHtml<'a> {
    name: &'a str,
    reference: &'a str,
    lines: &'a [MailLine],
    discount_percent: &'a str,
    total: &'a str,
    valid_until: &'a str,
    quote_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/quote_ready.txt")]
struct QuoteReadyText<'a> {
    name: &'a str,
    reference: &'a str,
    lines: &'a [MailLine],
    discount_percent: &'a str,
    total: &'a str,
    valid_until: &'a str,
    quote_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order_number: &'a str,
    quote_reference: &'a str,
    total: &'a str,
    payment_method: &'a str,
    shipping: &'a [String],
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order_number: &'a str,
    quote_reference: &'a str,
    total: &'a str,
    payment_method: &'a str,
    shipping: &'a [String],
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    order_number: &'a str,
    status_label: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    order_number: &'a str,
    status_label: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for transactional emails.
#[derive(Clone)]
pub struct MailService {
    smtp: Option<Arc<SmtpMailer>>,
    base_url: Url,
    staff_email: Option<String>,
}

impl MailService {
    /// Create the service. `None` config yields a disabled, log-only service.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(
        config: Option<&EmailConfig>,
        base_url: Url,
        staff_email: Option<String>,
    ) -> Result<Self, MailError> {
        let smtp = match config {
            Some(config) => {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_owned(),
                );
                let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .credentials(credentials)
                    .build();
                Some(Arc::new(SmtpMailer {
                    transport,
                    from_address: config.from_address.clone(),
                }))
            }
            None => {
                tracing::warn!("SMTP not configured; emails will be logged, not sent");
                None
            }
        };

        Ok(Self {
            smtp,
            base_url,
            staff_email,
        })
    }

    /// Whether SMTP delivery is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.smtp.is_some()
    }

    fn link(&self, path: &str) -> String {
        self.base_url
            .join(path)
            .map_or_else(|_| format!("{}{path}", self.base_url), String::from)
    }

    fn quote_link(&self, detail: &QuoteDetail) -> String {
        format!(
            "{}?token={}",
            self.link(&format!("quotes/{}", detail.quote.reference)),
            detail.quote.access_token
        )
    }

    /// Welcome a newly registered customer.
    pub fn send_welcome(&self, user: &User) {
        let name = user.display_name();
        let shop_url = self.link("");
        self.deliver(|| {
            Ok(OutgoingMail {
                to: user.email.to_string(),
                subject: "Welcome to Spareline".to_owned(),
                text: WelcomeText {
                    name: &name,
                    shop_url: &shop_url,
                }
                .render()?,
                html: WelcomeHtml {
                    name: &name,
                    shop_url: &shop_url,
                }
                .render()?,
            })
        });
    }

    /// Confirm receipt of a quote request to the customer.
    pub fn send_quote_received(&self, detail: &QuoteDetail) {
        let lines: Vec<MailLine> = detail.items.iter().map(MailLine::from).collect();
        let quote_url = self.quote_link(detail);
        let quote = &detail.quote;
        self.deliver(|| {
            Ok(OutgoingMail {
                to: quote.contact_email.clone(),
                subject: format!("We received your quote request {}", quote.reference),
                text: QuoteReceivedText {
                    name: &quote.contact_name,
                    reference: &quote.reference,
                    lines: &lines,
                    quote_url: &quote_url,
                }
                .render()?,
                html: QuoteReceivedHtml {
                    name: &quote.contact_name,
                    reference: &quote.reference,
                    lines: &lines,
                    quote_url: &quote_url,
                }
                .render()?,
            })
        });
    }

    /// Tell the sales team about a new quote request.
    pub fn send_staff_quote_notice(&self, detail: &QuoteDetail) {
        let Some(staff_email) = self.staff_email.clone() else {
            tracing::debug!(reference = %detail.quote.reference, "No staff email configured; skipping notice");
            return;
        };
        let lines: Vec<MailLine> = detail.items.iter().map(MailLine::from).collect();
        let admin_url = self.link(&format!("admin/quotes/{}", detail.quote.id));
        let quote = &detail.quote;
        let vehicle_info = quote.vehicle_info.as_deref().unwrap_or("-");
        let notes = quote.customer_notes.as_deref().unwrap_or("-");
        self.deliver(|| {
            Ok(OutgoingMail {
                to: staff_email,
                subject: format!("New quote request {}", quote.reference),
                text: QuoteStaffNoticeText {
                    reference: &quote.reference,
                    contact_name: &quote.contact_name,
                    contact_email: &quote.contact_email,
                    vehicle_info,
                    notes,
                    lines: &lines,
                    admin_url: &admin_url,
                }
                .render()?,
                html: QuoteStaffNoticeHtml {
                    reference: &quote.reference,
                    contact_name: &quote.contact_name,
                    contact_email: &quote.contact_email,
                    vehicle_info,
                    notes,
                    lines: &lines,
                    admin_url: &admin_url,
                }
                .render()?,
            })
        });
    }

    /// Send the priced quote to the customer.
    pub fn send_quote_ready(&self, detail: &QuoteDetail) {
        let lines: Vec<MailLine> = detail.items.iter().map(MailLine::from).collect();
        let quote_url = self.quote_link(detail);
        let quote = &detail.quote;
        let discount_percent = quote.discount_percent.normalize().to_string();
        let total = quote.total_amount.map(|t| t.to_string()).unwrap_or_default();
        let valid_until = quote
            .valid_until
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        self.deliver(|| {
            Ok(OutgoingMail {
                to: quote.contact_email.clone(),
                subject: format!("Your quote {} is ready", quote.reference),
                text: QuoteReadyText {
                    name: &quote.contact_name,
                    reference: &quote.reference,
                    lines: &lines,
                    discount_percent: &discount_percent,
                    total: &total,
                    valid_until: &valid_until,
                    quote_url: &quote_url,
                }
                .render()?,
                html: QuoteReadyHtml {
                    name: &quote.contact_name,
                    reference: &quote.reference,
                    lines: &lines,
                    discount_percent: &discount_percent,
                    total: &total,
                    valid_until: &valid_until,
                    quote_url: &quote_url,
                }
                .render()?,
            })
        });
    }

    /// Confirm a new order.
    pub fn send_order_confirmation(&self, order: &Order) {
        let total = order.total_amount.to_string();
        let shipping = address_lines(order);
        let order_url = self.link(&format!("orders/{}", order.order_number));
        self.deliver(|| {
            Ok(OutgoingMail {
                to: order.contact_email.clone(),
                subject: format!("Order {} confirmed", order.order_number),
                text: OrderConfirmationText {
                    order_number: &order.order_number,
                    quote_reference: &order.quote_reference,
                    total: &total,
                    payment_method: order.payment_method.label(),
                    shipping: &shipping,
                    order_url: &order_url,
                }
                .render()?,
                html: OrderConfirmationHtml {
                    order_number: &order.order_number,
                    quote_reference: &order.quote_reference,
                    total: &total,
                    payment_method: order.payment_method.label(),
                    shipping: &shipping,
                    order_url: &order_url,
                }
                .render()?,
            })
        });
    }

    /// Notify the customer of an order status change.
    pub fn send_order_status(&self, order: &Order) {
        let order_url = self.link(&format!("orders/{}", order.order_number));
        let tracking_number = order.tracking_number.as_deref().unwrap_or_default();
        self.deliver(|| {
            Ok(OutgoingMail {
                to: order.contact_email.clone(),
                subject: format!("Order {}: {}", order.order_number, order.status.label()),
                text: OrderStatusText {
                    order_number: &order.order_number,
                    status_label: order.status.label(),
                    tracking_number,
                    order_url: &order_url,
                }
                .render()?,
                html: OrderStatusHtml {
                    order_number: &order.order_number,
                    status_label: order.status.label(),
                    tracking_number,
                    order_url: &order_url,
                }
                .render()?,
            })
        });
    }

    /// Render now, deliver later. Failures are logged and dropped.
    fn deliver(&self, render: impl FnOnce() -> Result<OutgoingMail, MailError>) {
        let mail = match render() {
            Ok(mail) => mail,
            Err(e) => {
                tracing::error!(error = %e, "Failed to render email");
                return;
            }
        };

        let Some(smtp) = self.smtp.clone() else {
            tracing::info!(to = %mail.to, subject = %mail.subject, "Email disabled; not sending");
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = smtp.send(&mail).await {
                tracing::error!(to = %mail.to, subject = %mail.subject, error = %e, "Failed to send email");
            }
        });
    }
}

impl SmtpMailer {
    /// Send a multipart email with both plain text and HTML versions.
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(mail
                .to
                .parse()
                .map_err(|_| MailError::InvalidAddress(mail.to.clone()))?)
            .subject(mail.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html.clone()),
                    ),
            )?;

        self.transport.send(email).await?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Email sent");
        Ok(())
    }
}

fn address_lines(order: &Order) -> Vec<String> {
    let a = &order.shipping_address;
    let mut lines = vec![a.recipient.clone(), a.line1.clone()];
    if let Some(line2) = a.line2.as_deref().filter(|l| !l.trim().is_empty()) {
        lines.push(line2.to_owned());
    }
    lines.push(
        match a.postal_code.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(postal_code) => format!("{postal_code} {}", a.city),
            None => a.city.clone(),
        },
    );
    if let Some(region) = a.region.as_deref().filter(|r| !r.trim().is_empty()) {
        lines.push(region.to_owned());
    }
    lines.push(a.country.clone());
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use spareline_core::{ProductId, QuoteId, QuoteItemId};

    use super::*;

    fn lines() -> Vec<MailLine> {
        vec![MailLine::from(&QuoteItem {
            id: QuoteItemId::new(1),
            quote_id: QuoteId::new(1),
            product_id: ProductId::new(3),
            product_name: "Oil filter".to_owned(),
            product_slug: "oil-filter".to_owned(),
            part_number: Some("OF-100".to_owned()),
            quantity: 3,
            unit_price: Some(Decimal::new(1250, 2)),
        })]
    }

    #[test]
    fn test_mail_line_formats_prices() {
        let line = &lines()[0];
        assert_eq!(line.unit_price, "12.50");
        assert_eq!(line.line_total, "37.50");
        assert_eq!(line.part_number, "OF-100");
    }

    #[test]
    fn test_quote_ready_renders_both_parts() {
        let lines = lines();
        let text = QuoteReadyText {
            name: "Ana",
            reference: "RFQ-20260101-ABC123",
            lines: &lines,
            discount_percent: "10",
            total: "33.75",
            valid_until: "2026-01-08",
            quote_url: "http://localhost/quotes/RFQ-20260101-ABC123?token=t",
        }
        .render()
        .unwrap();
        assert!(text.contains("RFQ-20260101-ABC123"));
        assert!(text.contains("33.75"));
        assert!(text.contains("Oil filter"));

        let html = QuoteReadyHtml {
            name: "<Ana>",
            reference: "RFQ-20260101-ABC123",
            lines: &lines,
            discount_percent: "10",
            total: "33.75",
            valid_until: "2026-01-08",
            quote_url: "http://localhost/quotes/RFQ-20260101-ABC123?token=t",
        }
        .render()
        .unwrap();
        assert!(html.contains("&#60;Ana&#62;") || html.contains("&lt;Ana&gt;"));
    }

    #[tokio::test]
    async fn test_disabled_service_does_not_panic() {
        let service = MailService::new(None, Url::parse("http://localhost:3000/").unwrap(), None).unwrap();
        assert!(!service.is_enabled());
        assert_eq!(service.link("orders/ORD-1"), "http://localhost:3000/orders/ORD-1");
    }
}
