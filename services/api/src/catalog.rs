use crate::infra::{load_seed_data, DataArgs};
use clap::Args;
use onco_screen::config::AppConfig;
use onco_screen::error::AppError;
use onco_screen::screening::{Question, QuestionCatalog, RiskTier, RiskTierTable};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Args, Debug, Default)]
pub(crate) struct CatalogArgs {
    #[command(flatten)]
    pub(crate) data: DataArgs,
    /// Emit the summary as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConditionSummary {
    pub(crate) label: String,
    pub(crate) questions: usize,
    pub(crate) total_weight: f64,
    pub(crate) scoped_tiers: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CatalogSummary {
    pub(crate) general_questions: usize,
    pub(crate) general_weight: f64,
    pub(crate) conditions: Vec<ConditionSummary>,
    pub(crate) unscoped_tiers: usize,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn run_catalog_check(args: CatalogArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let data = args.data.resolve(config.quiz);
    let (catalog, tiers) = load_seed_data(&data)?;
    let summary = summarize(&catalog, &tiers);

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to render summary: {err}"),
        }
        return Ok(());
    }

    println!(
        "General questions: {} (total weight {})",
        summary.general_questions, summary.general_weight
    );
    for condition in &summary.conditions {
        println!(
            "  {:<10} {:>2} questions, weight {:>5}, {} scoped tiers",
            condition.label, condition.questions, condition.total_weight, condition.scoped_tiers
        );
    }
    println!("Unscoped tiers: {}", summary.unscoped_tiers);

    if summary.warnings.is_empty() {
        println!("No problems found.");
    } else {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

pub(crate) fn summarize(catalog: &QuestionCatalog, tiers: &RiskTierTable) -> CatalogSummary {
    let conditions = catalog
        .conditions()
        .into_iter()
        .map(|label| {
            let questions: Vec<&Question> = catalog
                .specialized()
                .iter()
                .filter(|question| question.category == label)
                .collect();
            ConditionSummary {
                label: label.to_string(),
                questions: questions.len(),
                total_weight: questions.iter().map(|question| question.weight).sum(),
                scoped_tiers: tiers
                    .tiers()
                    .iter()
                    .filter(|tier| tier.condition_scope.as_deref() == Some(label))
                    .count(),
            }
        })
        .collect();

    CatalogSummary {
        general_questions: catalog.general().len(),
        general_weight: catalog.general().iter().map(|question| question.weight).sum(),
        conditions,
        unscoped_tiers: tiers
            .tiers()
            .iter()
            .filter(|tier| tier.condition_scope.is_none())
            .count(),
        warnings: audit(catalog, tiers),
    }
}

/// Problems that load fine but show up at runtime as skipped branches,
/// unreachable question sets or scores without a tier.
pub(crate) fn audit(catalog: &QuestionCatalog, tiers: &RiskTierTable) -> Vec<String> {
    let mut warnings = Vec::new();
    let conditions: BTreeSet<&str> = catalog.conditions().into_iter().collect();

    let mut hinted = BTreeSet::new();
    for question in catalog.general() {
        for hint in &question.condition_hints {
            hinted.insert(hint.label.as_str());
            if !conditions.contains(hint.label.as_str()) {
                warnings.push(format!(
                    "question {} hints at `{}`, which has no specialized questions",
                    question.id, hint.label
                ));
            }
        }
    }
    for condition in &conditions {
        if !hinted.contains(condition) {
            warnings.push(format!(
                "condition `{condition}` is never hinted by a general question"
            ));
        }
    }

    for question in catalog.general().iter().chain(catalog.specialized()) {
        let Some(rules) = &question.branch_rules else {
            continue;
        };
        let targets = rules
            .on_answer
            .iter()
            .map(|(_, target)| *target)
            .chain(rules.default);
        for target in targets {
            let same_set = catalog
                .general()
                .iter()
                .chain(catalog.specialized())
                .any(|other| other.id == target && other.category == question.category);
            if !same_set {
                warnings.push(format!(
                    "question {} branches to {}, which is outside its question set",
                    question.id, target
                ));
            }
        }
    }

    let mut scopes: Vec<Option<&str>> = vec![None];
    for tier in tiers.tiers() {
        if let Some(scope) = tier.condition_scope.as_deref() {
            if !scopes.contains(&Some(scope)) {
                scopes.push(Some(scope));
                if !conditions.contains(scope) {
                    warnings.push(format!("tiers scoped to `{scope}` can never be selected"));
                }
            }
        }
    }
    for scope in scopes {
        let mut scoped: Vec<&RiskTier> = tiers
            .tiers()
            .iter()
            .filter(|tier| tier.condition_scope.as_deref() == scope)
            .collect();
        scoped.sort_by_key(|tier| tier.min_score);
        let label = scope.unwrap_or("unscoped");

        if scoped.is_empty() {
            warnings.push("no unscoped tiers; general-only scores have no advice".to_string());
            continue;
        }
        if scoped[0].min_score > 0 {
            warnings.push(format!(
                "{label} tiers start at {}, lower scores have no tier",
                scoped[0].min_score
            ));
        }
        for pair in scoped.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if upper.min_score > lower.max_score.saturating_add(1) {
                warnings.push(format!(
                    "{label} tiers leave scores {}-{} uncovered",
                    lower.max_score + 1,
                    upper.min_score - 1
                ));
            } else if upper.min_score <= lower.max_score {
                warnings.push(format!(
                    "{label} tiers `{}` and `{}` overlap",
                    lower.risk_level, upper.risk_level
                ));
            }
        }
    }

    warnings
}
