//! Built-in rule sets against the page fixture.

use super::FIXTURE;
use page_patcher::{
    apply_rule_sets, apply_rules, builtin, find_broken_joins, Report, RuleError, RuleOutcome,
};

fn all_outcomes(report: &Report, expected: &Result<RuleOutcome, RuleError>) -> bool {
    report.iter().all(|(_, result)| result == expected)
}

/// Copy-button rules applied once to the fixture.
fn with_copy_buttons() -> String {
    builtin("copy-buttons").unwrap().apply(FIXTURE).text
}

#[test]
fn test_copy_buttons_apply_to_fresh_page() {
    let set = builtin("copy-buttons").unwrap();
    let applied = set.apply(FIXTURE);

    assert_eq!(applied.report.applied(), 4, "{:#?}", applied.report);
    assert_eq!(applied.report.failed(), 0);
    assert!(applied.text.contains("UserPlus, Download, Copy } from 'lucide-react';"));
    assert!(applied.text.contains("title=\"Copiar dados do usuário\""));
    assert!(applied.text.contains("Copiar Todos"));
    assert!(applied.text.contains("title=\"Copiar dados da loja\""));
}

#[test]
fn test_user_copy_button_lands_before_closing_div() {
    let text = with_copy_buttons();

    let delete = text.find("Excluir").unwrap();
    let copy = text.find("title=\"Copiar dados do usuário\"").unwrap();
    let grid = text.find("{/* User Info Grid */}").unwrap();
    assert!(delete < copy && copy < grid);

    // The button group still closes right after the new button
    let after_copy = &text[copy..grid];
    let closing = after_copy.find("</button>").unwrap();
    assert!(after_copy[closing..]
        .trim_start_matches("</button>")
        .trim_start()
        .starts_with("</div>"));
}

#[test]
fn test_user_copy_rule_adds_exactly_one_button() {
    let set = builtin("copy-buttons").unwrap();
    let rule = set
        .rules
        .iter()
        .find(|rule| rule.id == "copy-user-button")
        .cloned()
        .unwrap();

    let once = apply_rules(FIXTURE, std::slice::from_ref(&rule));
    assert_eq!(
        once.text.matches("<button").count(),
        FIXTURE.matches("<button").count() + 1
    );
    assert_eq!(once.text.matches("Copiar dados do usuário").count(), 1);

    let twice = apply_rules(&once.text, &[rule]);
    assert_eq!(twice.text, once.text);
}

#[test]
fn test_store_row_buttons_are_grouped() {
    let text = with_copy_buttons();

    let group = text.find("<div className=\"flex items-center gap-2\">").unwrap();
    let copy = text.find("title=\"Copiar dados da loja\"").unwrap();
    let remove = text.find("title=\"Remover loja\"").unwrap();
    assert!(group < copy && copy < remove);
}

#[test]
fn test_copy_buttons_second_run_is_noop() {
    let set = builtin("copy-buttons").unwrap();
    let once = set.apply(FIXTURE);
    let twice = set.apply(&once.text);

    assert_eq!(twice.text, once.text);
    assert!(all_outcomes(&twice.report, &Ok(RuleOutcome::AlreadyApplied)));
}

#[test]
fn test_inserted_handlers_have_no_broken_joins() {
    assert!(find_broken_joins(&with_copy_buttons()).is_empty());
}

#[test]
fn test_repair_joins_restores_escaped_separators() {
    let good = with_copy_buttons();
    // Every escaped newline the copy handlers use, written out raw
    let broken = good.replace("\\n", "\n");
    assert_eq!(find_broken_joins(&broken).len(), 3);

    let set = builtin("repair-joins").unwrap();
    let repaired = set.apply(&broken);

    assert_eq!(repaired.text, good);
    assert_eq!(
        repaired.report.outcome("stores-template-newlines"),
        Some(&Ok(RuleOutcome::Applied { replacements: 1 }))
    );
    assert_eq!(
        repaired.report.outcome("separator-join-newlines"),
        Some(&Ok(RuleOutcome::Applied { replacements: 1 }))
    );
    assert_eq!(
        repaired.report.outcome("newline-join"),
        Some(&Ok(RuleOutcome::Applied { replacements: 2 }))
    );
    assert!(find_broken_joins(&repaired.text).is_empty());
}

#[test]
fn test_repair_joins_on_clean_page_finds_nothing() {
    let set = builtin("repair-joins").unwrap();
    let applied = set.apply(&with_copy_buttons());

    assert_eq!(applied.report.not_found(), set.rules.len());
    assert_eq!(applied.report.failed(), 0);
}

#[test]
fn test_empty_joins_restore_separators() {
    let good = with_copy_buttons();
    let emptied = good
        .replace("].join('\\n');", "].join('');")
        .replace(").join('\\n\\n---\\n\\n');", ").join('');");
    assert_ne!(emptied, good);

    let set = builtin("empty-joins").unwrap();
    let once = set.apply(&emptied);
    assert_eq!(once.text, good);
    assert_eq!(
        once.report.outcome("array-join-newline"),
        Some(&Ok(RuleOutcome::Applied { replacements: 2 }))
    );

    let twice = set.apply(&once.text);
    assert!(all_outcomes(&twice.report, &Ok(RuleOutcome::AlreadyApplied)));
}

#[test]
fn test_default_sets_on_fresh_page() {
    let sets = vec![
        builtin("copy-buttons").unwrap(),
        builtin("repair-joins").unwrap(),
    ];
    let applied = apply_rule_sets(FIXTURE, &sets);

    assert_eq!(applied.report.applied(), 4);
    assert_eq!(applied.report.not_found(), 3);
    assert_eq!(applied.report.failed(), 0);
    assert!(matches!(
        applied.report.outcome("repair-joins/newline-join"),
        Some(Err(RuleError::NotFound { .. }))
    ));
}

#[test]
fn test_drifted_anchor_reports_near_miss() {
    let drifted = FIXTURE.replace("title=\"Remover loja\"", "title=\"Remover a loja\"");
    let applied = builtin("copy-buttons").unwrap().apply(&drifted);

    assert_eq!(applied.report.applied(), 3);
    match applied.report.outcome("copy-store-button") {
        Some(Err(RuleError::NotFound { hint: Some(hint) })) => {
            assert_eq!(hint.expected, "title=\"Remover loja\"");
            assert_eq!(hint.found, "title=\"Remover a loja\"");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_rules_are_independent() {
    let set = builtin("copy-buttons").unwrap();
    let full = set.apply(FIXTURE);

    for skipped in 0..set.rules.len() {
        let mut rules = set.rules.clone();
        let removed = rules.remove(skipped);
        let partial = apply_rules(FIXTURE, &rules);

        for (id, result) in partial.report.iter() {
            assert_ne!(id, &removed.id);
            assert_eq!(
                Some(result),
                full.report.outcome(id),
                "{id} changed when {} was skipped",
                removed.id
            );
        }
    }
}
