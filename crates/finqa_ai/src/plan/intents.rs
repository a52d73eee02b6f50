use finqa_core::store::{quote_ident, ColumnSchema, TableSchema};

/// Recognized analytical intents, in matching order: most specific first,
/// so a year-over-year or superlative question is not swallowed by the
/// broader by-year breakdown. The first intent that matches the question
/// AND finds a schema-compatible table wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    /// Year-over-year change for a segment named in the question.
    NamedSegmentYoy,
    /// Largest segment by a numeric metric.
    TopSegmentByMetric,
    /// Revenue broken down by segment and fiscal year.
    SegmentRevenueByYear,
}

pub(crate) const INTENTS: [Intent; 3] = [
    Intent::NamedSegmentYoy,
    Intent::TopSegmentByMetric,
    Intent::SegmentRevenueByYear,
];

impl Intent {
    /// Capability check against the question text alone.
    pub(crate) fn matches(&self, question: &str) -> bool {
        let q = question.to_ascii_lowercase();
        let mentions_metric = q.contains("revenue") || q.contains("sales");
        match self {
            Intent::NamedSegmentYoy => {
                let change_word = ["yoy", "year-over-year", "year over year", "growth", "grew",
                    "change", "changed", "increase", "decrease", "delta"]
                .iter()
                .any(|w| q.contains(w));
                mentions_metric && change_word && named_segment(question).is_some()
            }
            Intent::SegmentRevenueByYear => {
                let per_year = ["by year", "per year", "yearly", "annual", "each year", "by fiscal"]
                    .iter()
                    .any(|w| q.contains(w));
                mentions_metric && (per_year || q.contains("segment"))
            }
            Intent::TopSegmentByMetric => {
                let superlative = ["top", "largest", "biggest", "highest", "leading"]
                    .iter()
                    .any(|w| q.contains(w));
                superlative && q.contains("segment")
            }
        }
    }

    /// Query builder: `Some(sql)` when the table's schema satisfies this
    /// intent, `None` otherwise. Emitted SQL is always a single SELECT/WITH
    /// statement, re-runnable verbatim.
    pub(crate) fn build(&self, question: &str, schema: &TableSchema) -> Option<String> {
        match self {
            Intent::NamedSegmentYoy => {
                let year = schema.column_named("year")?;
                let segment = schema.column_named("segment")?;
                let revenue = revenue_column(schema)?;
                let name = named_segment(question)?;
                let years = question_years(question);
                Some(build_named_segment_yoy(
                    &schema.name,
                    year,
                    segment,
                    revenue,
                    &name,
                    &years,
                ))
            }
            Intent::SegmentRevenueByYear => {
                let year = schema.column_named("year")?;
                let segment = schema.column_named("segment")?;
                let revenue = revenue_column(schema)?;
                Some(format!(
                    "SELECT CAST({y} AS TEXT) AS year, {s} AS segment, SUM({r}) AS revenue\n\
                     FROM {t}\n\
                     GROUP BY year, segment\n\
                     ORDER BY year, segment",
                    y = quote_ident(&year.name),
                    s = quote_ident(&segment.name),
                    r = quote_ident(&revenue.name),
                    t = quote_ident(&schema.name),
                ))
            }
            Intent::TopSegmentByMetric => {
                let segment = schema.column_named("segment")?;
                let metric = revenue_column(schema).or_else(|| numeric_metric_column(schema))?;
                Some(format!(
                    "SELECT {s} AS segment, SUM({m}) AS total\n\
                     FROM {t}\n\
                     GROUP BY segment\n\
                     ORDER BY total DESC, segment\n\
                     LIMIT 5",
                    s = quote_ident(&segment.name),
                    m = quote_ident(&metric.name),
                    t = quote_ident(&schema.name),
                ))
            }
        }
    }
}

fn build_named_segment_yoy(
    table: &str,
    year: &ColumnSchema,
    segment: &ColumnSchema,
    revenue: &ColumnSchema,
    segment_name: &str,
    years: &[i32],
) -> String {
    let t = quote_ident(table);
    let y = quote_ident(&year.name);
    let s = quote_ident(&segment.name);
    let r = quote_ident(&revenue.name);
    let seg = quote_str(segment_name);

    if years.len() >= 2 {
        // Pivot the earliest/latest named years into one comparison row.
        let lo = years.iter().min().copied().unwrap_or(0);
        let hi = years.iter().max().copied().unwrap_or(0);
        let lo_sum = format!("SUM(CASE WHEN year = '{lo}' THEN revenue ELSE 0 END)");
        let hi_sum = format!("SUM(CASE WHEN year = '{hi}' THEN revenue ELSE 0 END)");

        let mut lines = Vec::new();
        lines.push("WITH base AS (".to_string());
        lines.push(format!(
            "  SELECT CAST({y} AS TEXT) AS year, {s} AS segment, {r} AS revenue"
        ));
        lines.push(format!("  FROM {t}"));
        lines.push(format!(
            "  WHERE {s} = {seg} AND CAST({y} AS TEXT) IN ('{lo}', '{hi}')"
        ));
        lines.push("),".to_string());
        lines.push("agg AS (".to_string());
        lines.push(
            "  SELECT year, segment, SUM(revenue) AS revenue FROM base GROUP BY year, segment"
                .to_string(),
        );
        lines.push(")".to_string());
        lines.push("SELECT".to_string());
        lines.push("  segment,".to_string());
        lines.push(format!("  {lo_sum} AS rev_{lo},"));
        lines.push(format!("  {hi_sum} AS rev_{hi},"));
        lines.push(format!("  {hi_sum} - {lo_sum} AS yoy_delta,"));
        lines.push(format!(
            "  CASE WHEN {lo_sum} = 0 THEN NULL ELSE ({hi_sum} - {lo_sum}) * 100.0 / {lo_sum} END AS yoy_pct"
        ));
        lines.push("FROM agg".to_string());
        lines.push("GROUP BY segment".to_string());
        return lines.join("\n");
    }

    // No usable years in the question: return the per-year series instead.
    let mut lines = Vec::new();
    lines.push(format!(
        "SELECT CAST({y} AS TEXT) AS year, {s} AS segment, SUM({r}) AS revenue"
    ));
    lines.push(format!("FROM {t}"));
    lines.push(format!("WHERE {s} = {seg}"));
    lines.push("GROUP BY year, segment".to_string());
    lines.push("ORDER BY year DESC".to_string());
    lines.push("LIMIT 8".to_string());
    lines.join("\n")
}

fn revenue_column(schema: &TableSchema) -> Option<&ColumnSchema> {
    schema
        .column_named("revenue_usd_m")
        .or_else(|| schema.column_named("revenue"))
}

fn numeric_metric_column(schema: &TableSchema) -> Option<&ColumnSchema> {
    schema.columns.iter().find(|c| {
        let numeric = ["INT", "REAL", "NUM", "FLOA", "DOUB", "DECI"]
            .iter()
            .any(|t| c.decl_type.contains(t));
        numeric && !c.name.eq_ignore_ascii_case("year")
    })
}

/// The segment named in the question, when one is recognizable: the word
/// immediately before "revenue"/"sales", skipping generic qualifiers.
pub(crate) fn named_segment(question: &str) -> Option<String> {
    const GENERIC: [&str; 10] = [
        "segment", "total", "the", "of", "annual", "yearly", "quarterly", "net", "overall", "its",
    ];
    let words: Vec<&str> = question.split_whitespace().collect();
    for (i, w) in words.iter().enumerate() {
        let lw = trim_word(w).to_ascii_lowercase();
        if lw == "revenue" || lw == "sales" {
            if i == 0 {
                return None;
            }
            let prev = trim_word(words[i - 1]);
            if prev.is_empty() || GENERIC.contains(&prev.to_ascii_lowercase().as_str()) {
                return None;
            }
            return Some(prev.to_string());
        }
    }
    None
}

/// Four-digit years mentioned in the question, ascending and deduplicated.
pub(crate) fn question_years(question: &str) -> Vec<i32> {
    let mut years: Vec<i32> = question
        .split(|c: char| !c.is_ascii_digit())
        .filter(|t| t.len() == 4)
        .filter_map(|t| t.parse::<i32>().ok())
        .filter(|y| (1900..2100).contains(y))
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}

fn trim_word(w: &str) -> &str {
    w.trim_matches(|c: char| !c.is_alphanumeric())
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
