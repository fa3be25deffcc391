//! Plain-text rendering of API records

use crate::dashboard::Dashboard;
use chrono::{DateTime, Utc};
use hepatica_core::{AdminMetrics, ConsentStatus, Faq, Hospital, Prediction, Session};
use serde_json::Value as JsonValue;
use std::io::{self, Write};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_feature(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "-".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn session(out: &mut impl Write, session: &Session) -> io::Result<()> {
    match session.user() {
        Some(user) if session.is_authenticated() => writeln!(
            out,
            "Signed in as {} ({}) <{}>, role: {}",
            user.display_name(),
            user.username,
            user.email,
            user.role
        ),
        _ => writeln!(out, "Not signed in"),
    }
}

pub fn prediction(out: &mut impl Write, prediction: &Prediction) -> io::Result<()> {
    writeln!(
        out,
        "#{} {} stage {} (confidence {:.1}%) [{}]",
        prediction.id,
        format_date(&prediction.created_at),
        prediction.result,
        prediction.confidence * 100.0,
        prediction.status
    )?;
    for (name, value) in &prediction.features {
        writeln!(out, "    {name}: {}", format_feature(value))?;
    }
    Ok(())
}

pub fn predictions(out: &mut impl Write, predictions: &[Prediction]) -> io::Result<()> {
    if predictions.is_empty() {
        return writeln!(out, "No predictions yet");
    }
    for item in predictions {
        prediction(out, item)?;
    }
    Ok(())
}

pub fn faqs(out: &mut impl Write, faqs: &[Faq]) -> io::Result<()> {
    for faq in faqs {
        writeln!(out, "[{}] {}", faq.category, faq.question)?;
        writeln!(out, "    {}", faq.answer)?;
    }
    Ok(())
}

pub fn hospitals(out: &mut impl Write, hospitals: &[Hospital]) -> io::Result<()> {
    for hospital in hospitals {
        writeln!(
            out,
            "{} ({}): {}, {}",
            hospital.name, hospital.specialty, hospital.address, hospital.phone
        )?;
    }
    Ok(())
}

pub fn consent(out: &mut impl Write, consent: &ConsentStatus) -> io::Result<()> {
    match (consent.consent_given, &consent.consent_date) {
        (true, Some(date)) => writeln!(
            out,
            "Consent ({}) given on {}",
            consent.consent_type,
            format_date(date)
        ),
        (true, None) => writeln!(out, "Consent ({}) given", consent.consent_type),
        (false, _) => writeln!(
            out,
            "Consent ({}) not given; run `hepatica consent accept`",
            consent.consent_type
        ),
    }
}

pub fn metrics(out: &mut impl Write, metrics: &AdminMetrics) -> io::Result<()> {
    writeln!(out, "Total patients:    {}", metrics.total_patients)?;
    writeln!(out, "Total predictions: {}", metrics.total_predictions)?;
    writeln!(out, "Predictions today: {}", metrics.predictions_today)?;
    writeln!(out, "Accuracy rate:     {:.1}%", metrics.accuracy_rate * 100.0)?;
    writeln!(out, "Active users:      {}", metrics.active_users)
}

pub fn dashboard(out: &mut impl Write, dashboard: &Dashboard) -> io::Result<()> {
    match dashboard {
        Dashboard::Patient {
            predictions: items,
            faqs: faq_items,
            hospitals: hospital_items,
            consent: status,
        } => {
            if let Some(status) = status {
                writeln!(out, "== Consent ==")?;
                consent(out, status)?;
                writeln!(out)?;
            }
            writeln!(out, "== Predictions ==")?;
            predictions(out, items)?;
            writeln!(out, "\n== Hospitals ==")?;
            hospitals(out, hospital_items)?;
            writeln!(out, "\n== FAQs ==")?;
            faqs(out, faq_items)
        }
        Dashboard::Clinician {
            metrics: stats,
            predictions: items,
            faqs: faq_items,
            hospitals: hospital_items,
        } => {
            writeln!(out, "== Metrics ==")?;
            metrics(out, stats)?;
            writeln!(out, "\n== Predictions ==")?;
            predictions(out, items)?;
            writeln!(out, "\n== Hospitals ==")?;
            hospitals(out, hospital_items)?;
            writeln!(out, "\n== FAQs ==")?;
            faqs(out, faq_items)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_prediction_rendering() {
        let item = Prediction {
            id: 7,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            features: BTreeMap::from([
                ("Age".to_string(), JsonValue::from(54)),
                ("Edema".to_string(), JsonValue::Null),
                ("Sex".to_string(), JsonValue::from("M")),
            ]),
            result: 2.0,
            confidence: 0.875,
            status: "completed".to_string(),
        };

        let text = render(|out| prediction(out, &item));
        assert!(text.starts_with("#7 2025-03-01 10:00 stage 2 (confidence 87.5%) [completed]"));
        assert!(text.contains("    Age: 54\n"));
        assert!(text.contains("    Edema: -\n"));
        assert!(text.contains("    Sex: M\n"));
    }

    #[test]
    fn test_empty_predictions() {
        assert_eq!(render(|out| predictions(out, &[])), "No predictions yet\n");
    }

    #[test]
    fn test_consent_rendering() {
        let mut status = ConsentStatus {
            id: 1,
            user: 1,
            consent_given: false,
            consent_date: None,
            consent_type: "data_processing".to_string(),
        };
        assert!(render(|out| consent(out, &status)).contains("consent accept"));

        status.consent_given = true;
        status.consent_date = Some(Utc.with_ymd_and_hms(2025, 3, 2, 8, 30, 0).unwrap());
        assert_eq!(
            render(|out| consent(out, &status)),
            "Consent (data_processing) given on 2025-03-02 08:30\n"
        );
    }

    #[test]
    fn test_patient_dashboard_hides_missing_consent() {
        let board = Dashboard::Patient {
            predictions: Vec::new(),
            faqs: Vec::new(),
            hospitals: Vec::new(),
            consent: None,
        };
        let text = render(|out| dashboard(out, &board));
        assert!(text.starts_with("== Predictions ==\n"));
        assert!(!text.contains("Consent"));
    }

    #[test]
    fn test_anonymous_session() {
        assert_eq!(
            render(|out| session(out, &Session::anonymous())),
            "Not signed in\n"
        );
    }
}
