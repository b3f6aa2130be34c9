//! Plain-text renderings of an order: itinerary, messenger summary and
//! per-line confirmation.
//!
//! All functions are pure; nothing here touches the store.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::calculators::{format_brl, line_breakdown, price_line_item};
use super::error::ValidationError;
use super::models::{BookedLine, OrderAggregate};

const RULE_WIDTH: usize = 40;

/// Itinerary text for an order.
///
/// An operator-edited itinerary is returned untouched. Otherwise a draft is
/// built from the lines grouped by service date.
pub fn render_itinerary(aggregate: &OrderAggregate) -> Result<String, ValidationError> {
    if !aggregate.order.itinerary.is_empty() {
        return Ok(aggregate.order.itinerary.clone());
    }
    draft_itinerary(aggregate)
}

/// Itinerary draft generated from the booked lines, ignoring any edit.
pub fn draft_itinerary(aggregate: &OrderAggregate) -> Result<String, ValidationError> {
    let mut by_date: BTreeMap<_, Vec<&BookedLine>> = BTreeMap::new();
    for line in &aggregate.lines {
        by_date.entry(line.item.service_date).or_default().push(line);
    }

    let mut parts: Vec<String> = Vec::new();
    for (date, lines) in by_date {
        parts.push(format!(
            "{} {}\n",
            date.format("%A").to_string().to_uppercase(),
            date.format("%d/%m")
        ));

        for line in lines {
            parts.push(format!("\n{}:", line.service.name));
            parts.extend(
                line.service
                    .description
                    .trim()
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(|l| format!("- {l}")),
            );

            let total = price_line_item(&line.item, &line.service.age_policy())?;
            if total > Decimal::ZERO {
                parts.push(format_brl(total));
            }
            parts.push(String::new());
        }

        parts.push("\n".to_string());
    }

    Ok(parts.join("\n"))
}

/// Summary message sent to the client over WhatsApp.
pub fn render_messenger_text(
    aggregate: &OrderAggregate,
    total: Decimal,
) -> Result<String, ValidationError> {
    let order = &aggregate.order;
    let rule = "=".repeat(RULE_WIDTH);
    let client = aggregate
        .client
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("Sem cliente");

    let mut text = format!("*ROTEIRO - OS {}*\n", order.number);
    text.push_str(&format!("*Cliente:* {client}\n"));
    if let (Some(start), Some(end)) = (order.start_date, order.end_date) {
        text.push_str(&format!(
            "*Período:* {} a {}\n",
            start.format("%d/%m/%Y"),
            end.format("%d/%m/%Y")
        ));
    }

    text.push_str(&format!("\n{rule}\n\n"));
    text.push_str(&render_itinerary(aggregate)?);
    text.push_str(&format!("\n{rule}\n"));
    text.push_str(&format!("\n*VALOR TOTAL: {}*", format_brl(total)));

    Ok(text)
}

/// Confirmation message for a single booking line.
pub fn render_line_confirmation(line: &BookedLine) -> Result<String, ValidationError> {
    let item = &line.item;
    let breakdown = line_breakdown(item, &line.service.age_policy())?;

    let mut pax = Vec::new();
    if item.qty_full > 0 {
        pax.push(format!("{} inteira(s)", item.qty_full));
    }
    if item.qty_half > 0 {
        if item.half_price_justifications.is_empty() {
            pax.push(format!("{} meia(s)", item.qty_half));
        } else {
            let labels: Vec<&str> = item
                .half_price_justifications
                .iter()
                .map(|kind| kind.label())
                .collect();
            pax.push(format!("{} meia(s) ({})", item.qty_half, labels.join(", ")));
        }
    }
    if item.qty_child > 0 {
        let mut ages = String::new();
        if !item.child_ages.is_empty() {
            let listed: Vec<String> = item.child_ages.iter().map(i32::to_string).collect();
            ages = format!(" - Idades: {}", listed.join(", "));
            if breakdown.classification.exempt > 0 {
                ages.push_str(&format!(" ({} isenta(s))", breakdown.classification.exempt));
            }
        }
        pax.push(format!("{} infantil(is){ages}", item.qty_child));
    }
    let pax = if pax.is_empty() {
        "Sem passageiros".to_string()
    } else {
        pax.join(", ")
    };

    let notes = if item.public_notes.is_empty() {
        String::new()
    } else {
        format!("\n📝 Detalhes: {}", item.public_notes)
    };

    Ok(format!(
        "Olá! Segue confirmação do serviço:\n\n\
         🗓 *Data:* {date}\n\
         📍 *Serviço:* {service} ({category})\n\
         👥 *Pax:* {total_pax} pessoa(s) - {pax}{notes}\n\
         💰 *Valor Total:* {total}\n\n\
         Aguardamos você! 🎉",
        date = item.service_date.format("%d/%m/%Y"),
        service = line.service.name,
        category = line.category_name,
        total_pax = item.total_pax(),
        total = format_brl(breakdown.total),
    ))
}
