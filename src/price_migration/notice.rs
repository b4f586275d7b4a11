//! Price change notice rendering.

use chrono::{DateTime, Utc};

use crate::pricing::{Currency, PriceSheet, Tier, format_amount};

/// Rendered notice, ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub subject: String,
    pub html: String,
}

/// Everything needed to tell one customer about their price change.
#[derive(Debug, Clone, Copy)]
pub struct NoticeContext<'a> {
    pub organisation_name: &'a str,
    pub tier: Tier,
    pub currency: Currency,
    pub old_pricing: &'a PriceSheet,
    pub new_pricing: &'a PriceSheet,
    pub effective_date: DateTime<Utc>,
}

pub fn render_notice(ctx: &NoticeContext<'_>) -> Notice {
    let subject = format!(
        "Changes to your {} plan pricing from {}",
        ctx.tier.display_name(),
        ctx.effective_date.format("%-d %B %Y")
    );

    let mut rows = String::new();

    let old_plan = ctx.old_pricing.tier_price(ctx.tier, ctx.currency);
    let new_plan = ctx.new_pricing.tier_price(ctx.tier, ctx.currency);
    if let (Some(old), Some(new)) = (old_plan, new_plan) {
        rows.push_str(&price_row(
            &format!("{} plan (monthly)", ctx.tier.display_name()),
            old.monthly,
            new.monthly,
            ctx.currency,
        ));
        if let (Some(old_annual), Some(new_annual)) = (old.annual, new.annual) {
            rows.push_str(&price_row(
                &format!("{} plan (annual)", ctx.tier.display_name()),
                old_annual,
                new_annual,
                ctx.currency,
            ));
        }
    }

    if let (Some(old_credit), Some(new_credit)) = (
        ctx.old_pricing.credit_price(ctx.currency),
        ctx.new_pricing.credit_price(ctx.currency),
    ) {
        rows.push_str(&price_row(
            "Additional credit",
            old_credit,
            new_credit,
            ctx.currency,
        ));
    }

    let html = format!(
        concat!(
            "<html><body>",
            "<p>Hello {name},</p>",
            "<p>We are updating the pricing of our {tier} plan. ",
            "The new prices apply from your first billing cycle on or after <strong>{date}</strong>. ",
            "No action is needed on your part and you will not be charged a prorated amount.</p>",
            "<table cellpadding=\"6\" style=\"border-collapse: collapse;\">",
            "<thead><tr><th align=\"left\"></th><th align=\"right\">Current</th><th align=\"right\">New</th></tr></thead>",
            "<tbody>{rows}</tbody>",
            "</table>",
            "<p>If you have any questions, just reply to this email.</p>",
            "</body></html>"
        ),
        name = escape_html(ctx.organisation_name),
        tier = ctx.tier.display_name(),
        date = ctx.effective_date.format("%-d %B %Y"),
        rows = rows,
    );

    Notice { subject, html }
}

fn price_row(label: &str, old: i64, new: i64, currency: Currency) -> String {
    format!(
        "<tr><td>{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
        escape_html(label),
        format_amount(old, currency),
        format_amount(new, currency)
    )
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
