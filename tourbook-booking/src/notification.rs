use tourbook_core::notification::EmailMessage;
use tourbook_core::payment::{format_amount, RefundResult};
use tourbook_core::Booking;

struct Template {
    subject: &'static str,
    greeting: &'static str,
    cancelled: &'static str,
    reason: &'static str,
    refund_done: &'static str,
    refund_failed: &'static str,
    no_refund: &'static str,
    closing: &'static str,
}

const EN: Template = Template {
    subject: "Your booking has been cancelled",
    greeting: "Hello",
    cancelled: "Your booking for {tour} on {date} ({party} participants) has been cancelled.",
    reason: "Reason",
    refund_done: "A refund of {amount} has been issued. Please allow a few business days for it to appear.",
    refund_failed: "We could not process your refund automatically. Our team will contact you shortly.",
    no_refund: "No refund has been issued for this booking.",
    closing: "We hope to welcome you another time.",
};

const FR: Template = Template {
    subject: "Votre réservation a été annulée",
    greeting: "Bonjour",
    cancelled: "Votre réservation pour {tour} le {date} ({party} participants) a été annulée.",
    reason: "Motif",
    refund_done: "Un remboursement de {amount} a été effectué. Il apparaîtra sous quelques jours ouvrés.",
    refund_failed: "Nous n'avons pas pu traiter votre remboursement automatiquement. Notre équipe vous contactera rapidement.",
    no_refund: "Aucun remboursement n'a été effectué pour cette réservation.",
    closing: "Nous espérons vous accueillir une prochaine fois.",
};

const ES: Template = Template {
    subject: "Su reserva ha sido cancelada",
    greeting: "Hola",
    cancelled: "Su reserva para {tour} el {date} ({party} participantes) ha sido cancelada.",
    reason: "Motivo",
    refund_done: "Se ha emitido un reembolso de {amount}. Puede tardar unos días hábiles en aparecer.",
    refund_failed: "No hemos podido procesar su reembolso automáticamente. Nuestro equipo se pondrá en contacto con usted.",
    no_refund: "No se ha emitido ningún reembolso para esta reserva.",
    closing: "Esperamos darle la bienvenida en otra ocasión.",
};

const DE: Template = Template {
    subject: "Ihre Buchung wurde storniert",
    greeting: "Hallo",
    cancelled: "Ihre Buchung für {tour} am {date} ({party} Teilnehmer) wurde storniert.",
    reason: "Grund",
    refund_done: "Eine Erstattung von {amount} wurde veranlasst. Bitte rechnen Sie mit einigen Werktagen.",
    refund_failed: "Ihre Erstattung konnte nicht automatisch bearbeitet werden. Unser Team meldet sich in Kürze bei Ihnen.",
    no_refund: "Für diese Buchung wurde keine Erstattung veranlasst.",
    closing: "Wir freuen uns, Sie ein anderes Mal begrüßen zu dürfen.",
};

fn template(language: &str) -> Option<&'static Template> {
    // "fr-CA" and "FR" both select French.
    let primary = language.split(['-', '_']).next().unwrap_or("").to_ascii_lowercase();
    match primary.as_str() {
        "en" => Some(&EN),
        "fr" => Some(&FR),
        "es" => Some(&ES),
        "de" => Some(&DE),
        _ => None,
    }
}

/// Localized cancellation notice, or `None` when the booking has no address.
pub fn render_cancellation_email(
    booking: &Booking,
    refund: Option<&RefundResult>,
    default_language: &str,
    default_currency: &str,
) -> Option<EmailMessage> {
    let to = booking.email.clone().filter(|e| !e.expose().trim().is_empty())?;

    let t = booking
        .language
        .as_deref()
        .and_then(template)
        .or_else(|| template(default_language))
        .unwrap_or(&EN);

    let greeting = match booking.customer_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => format!("{} {},", t.greeting, name),
        _ => format!("{},", t.greeting),
    };

    let mut body = vec![
        greeting,
        String::new(),
        t.cancelled
            .replace("{tour}", &booking.tour_slug)
            .replace("{date}", &booking.date.format("%Y-%m-%d").to_string())
            .replace("{party}", &booking.party_size.to_string()),
    ];

    if let Some(reason) = booking.cancellation_reason.as_deref().filter(|r| !r.trim().is_empty()) {
        body.push(format!("{}: {}", t.reason, reason.trim()));
    }

    body.push(String::new());
    body.push(match refund {
        Some(result) if result.success => {
            let currency = booking.currency.as_deref().unwrap_or(default_currency);
            let amount = format!("{} {}", format_amount(booking.amount_cents), currency);
            t.refund_done.replace("{amount}", &amount)
        }
        Some(_) => t.refund_failed.to_string(),
        None => t.no_refund.to_string(),
    });
    body.push(String::new());
    body.push(t.closing.to_string());

    Some(EmailMessage {
        to,
        subject: t.subject.to_string(),
        body: body.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tourbook_core::PaymentMethod;

    fn booking(language: Option<&str>) -> Booking {
        let mut booking = Booking::new("cave-tour", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 3)
            .with_payment(PaymentMethod::Paypal, Some("CAP-1"), 5000)
            .with_contact("guest@example.com", language);
        booking.cancellation_reason = Some("Flooding in the cave".to_string());
        booking
    }

    fn refunded() -> RefundResult {
        RefundResult {
            success: true,
            refund_id: Some("RF-1".to_string()),
            error: None,
            mock_response: false,
        }
    }

    #[test]
    fn test_english_with_refund() {
        let email = render_cancellation_email(&booking(None), Some(&refunded()), "en", "EUR").unwrap();
        assert_eq!(email.subject, "Your booking has been cancelled");
        assert_eq!(email.to.expose(), "guest@example.com");
        assert!(email.body.contains("cave-tour on 2024-06-01 (3 participants)"));
        assert!(email.body.contains("Reason: Flooding in the cave"));
        assert!(email.body.contains("50.00 EUR"));
    }

    #[test]
    fn test_language_selection() {
        let fr = render_cancellation_email(&booking(Some("fr-CA")), None, "en", "EUR").unwrap();
        assert_eq!(fr.subject, "Votre réservation a été annulée");
        assert!(fr.body.contains("Aucun remboursement"));

        let de = render_cancellation_email(&booking(None), None, "de", "EUR").unwrap();
        assert_eq!(de.subject, "Ihre Buchung wurde storniert");

        let unknown = render_cancellation_email(&booking(Some("xx")), None, "yy", "EUR").unwrap();
        assert_eq!(unknown.subject, EN.subject);
    }

    #[test]
    fn test_failed_refund_wording() {
        let failed = RefundResult {
            success: false,
            refund_id: None,
            error: Some("Stripe refunds not yet implemented".to_string()),
            mock_response: false,
        };
        let email = render_cancellation_email(&booking(Some("es")), Some(&failed), "en", "EUR").unwrap();
        assert!(email.body.contains("No hemos podido procesar"));
    }

    #[test]
    fn test_no_address_no_email() {
        let booking = Booking::new("cave-tour", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 1);
        assert!(render_cancellation_email(&booking, None, "en", "EUR").is_none());
    }
}
