// CSV rendering of a ranking for the command-line binary. The engine never
// owns a wire format; this is display output only.

use crate::core::rank::Ranking;
use csv::WriterBuilder;
use itertools::Itertools;
use std::io::Write;

pub fn write_ranking_csv(writer: impl Write, ranking: &Ranking) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);

    writer.write_record([
        "Rank",
        "Offer",
        "Total",
        "Subscription",
        "Energy",
        "Savings",
        "Breakdown",
    ])?;
    writer.write_record([
        "[count]",
        "[id]",
        "[EUR]",
        "[EUR]",
        "[EUR]",
        "[EUR]",
        "[EUR per label]",
    ])?;

    for (position, entry) in ranking.entries.iter().enumerate() {
        let breakdown = entry
            .cost
            .per_bucket_cost
            .iter()
            .map(|(label, cost)| format!("{label}={cost:.2}"))
            .join("; ");
        writer.write_record([
            (position + 1).to_string(),
            entry.cost.offer_id.clone(),
            format!("{:.2}", entry.cost.total_cost),
            format!("{:.2}", entry.cost.subscription_cost),
            format!("{:.2}", entry.cost.energy_cost()),
            entry
                .savings
                .map(|savings| format!("{savings:.2}"))
                .unwrap_or_default(),
            breakdown,
        ])?;
    }

    writer.flush()?;
    Ok(())
}
