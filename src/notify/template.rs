//! HTML rendering for prediction report emails

use crate::predict::{ClaimFeatures, PredictionOutcome};
use chrono::{DateTime, Utc};

/// BMI band with its risk description
fn bmi_band(bmi: f64) -> (&'static str, &'static str, &'static str) {
    if bmi < 18.5 {
        (
            "Underweight",
            "Moderate",
            "BMI below normal range may indicate nutritional deficiencies",
        )
    } else if bmi < 25.0 {
        (
            "Normal Weight",
            "Low",
            "BMI in healthy range - optimal for insurance risk assessment",
        )
    } else if bmi < 30.0 {
        (
            "Overweight",
            "Moderate",
            "BMI above normal range - lifestyle modifications recommended",
        )
    } else {
        (
            "Obese",
            "High",
            "BMI indicates obesity - significant health risks and higher claim probability",
        )
    }
}

fn insights(patient: &ClaimFeatures, outcome: &PredictionOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    if patient.age > 50.0 {
        lines.push(format!(
            "Age factor: at {:.0} years, age-related health risks may contribute to higher claim probability",
            patient.age
        ));
    }

    if patient.bmi < 18.5 {
        lines.push("BMI indicates underweight status - consider nutritional consultation".to_string());
    } else if patient.bmi > 30.0 {
        lines.push(
            "BMI indicates obesity - lifestyle modifications recommended to reduce health risks"
                .to_string(),
        );
    } else if patient.bmi <= 25.0 {
        lines.push("BMI is in healthy range - maintain current lifestyle for optimal health".to_string());
    }

    if patient.smoker == "Yes" {
        lines.push(
            "Smoking significantly increases health risks and claim probability - cessation programs recommended"
                .to_string(),
        );
    } else {
        lines.push("Non-smoking status contributes positively to health profile".to_string());
    }

    if outcome.confidence > 0.8 {
        lines.push(
            "High prediction confidence indicates reliable estimate based on comprehensive data analysis"
                .to_string(),
        );
    } else if outcome.confidence < 0.6 {
        lines.push("Moderate prediction confidence - additional health data may improve accuracy".to_string());
    }

    lines
}

/// Format an amount in rupees with thousands separators.
pub fn format_inr(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}

/// Subject line for a prediction report.
pub fn report_subject(outcome: &PredictionOutcome) -> String {
    format!("Claim Prediction Report - {}", format_inr(outcome.prediction))
}

/// Render the full HTML report body.
pub fn render_report(
    recipient: &str,
    outcome: &PredictionOutcome,
    patient: &ClaimFeatures,
    generated_at: DateTime<Utc>,
) -> String {
    let (bmi_category, risk_level, risk_description) = bmi_band(patient.bmi);
    let confidence_pct = (outcome.confidence * 100.0 * 10.0).round() / 10.0;
    let timestamp = generated_at.format("%B %d, %Y at %H:%M UTC");
    let premium = patient
        .premium_annual_inr
        .map(format_inr)
        .unwrap_or_else(|| "Estimated".to_string());

    let insight_items: String = insights(patient, outcome)
        .into_iter()
        .map(|line| format!("            <li>{}</li>\n", line))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Claim Prediction Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 20px; background-color: #f4f4f4; }}
        .container {{ max-width: 600px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; }}
        .header {{ background: #4a67d8; color: white; padding: 20px; border-radius: 8px; text-align: center; margin-bottom: 30px; }}
        .section h2 {{ color: #4a67d8; border-bottom: 2px solid #4a67d8; padding-bottom: 5px; }}
        .info-item {{ background: #f8f9fa; padding: 12px; border-radius: 5px; border-left: 4px solid #4a67d8; margin-bottom: 8px; }}
        .prediction {{ background: #4a67d8; color: white; padding: 20px; border-radius: 8px; text-align: center; margin: 20px 0; }}
        .prediction .amount {{ font-size: 28px; font-weight: bold; }}
        .risk {{ background: #fff3cd; padding: 15px; border-radius: 5px; margin: 15px 0; }}
        .disclaimer {{ background: #e9ecef; padding: 15px; border-radius: 5px; margin-top: 20px; font-size: 12px; color: #666; }}
        .footer {{ text-align: center; margin-top: 30px; color: #666; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Claim Prediction Report</h1>
        </div>
        <div class="section">
            <h2>Patient Information</h2>
            <div class="info-item"><strong>Age:</strong> {age:.0} years</div>
            <div class="info-item"><strong>BMI:</strong> {bmi}</div>
            <div class="info-item"><strong>Gender:</strong> {gender}</div>
            <div class="info-item"><strong>Smoking Status:</strong> {smoker}</div>
            <div class="info-item"><strong>Region:</strong> {region}</div>
            <div class="info-item"><strong>Annual Premium:</strong> {premium}</div>
        </div>
        <div class="prediction">
            <div class="amount">{amount}</div>
            <div>Confidence: {confidence}% | Generated: {timestamp}</div>
        </div>
        <div class="section">
            <h2>BMI Analysis</h2>
            <div class="info-item"><strong>BMI Category:</strong> {bmi_category}</div>
            <div class="risk"><strong>Health Risk Level: {risk_level}</strong><p>{risk_description}</p></div>
        </div>
        <div class="section">
            <h2>Key Insights</h2>
            <ul>
{insight_items}            </ul>
        </div>
        <div class="disclaimer">
            <strong>Disclaimer:</strong> This machine-generated prediction is for informational purposes only
            and is not a substitute for professional medical or actuarial advice.
        </div>
        <div class="footer">
            <p>This report was generated on {timestamp} for {recipient}</p>
        </div>
    </div>
</body>
</html>
"#,
        age = patient.age,
        bmi = patient.bmi,
        gender = patient.gender,
        smoker = patient.smoker,
        region = patient.region,
        premium = premium,
        amount = format_inr(outcome.prediction),
        confidence = confidence_pct,
        timestamp = timestamp,
        bmi_category = bmi_category,
        risk_level = risk_level,
        risk_description = risk_description,
        insight_items = insight_items,
        recipient = recipient,
    )
}
