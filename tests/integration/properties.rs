//! Property tests for idempotence and string-span safety.

use super::FIXTURE;
use page_patcher::{
    apply_rule_sets, apply_rules, builtin, check_fragment, normalize_whitespace, Rule, RuleError,
    RuleOutcome, RuleSet,
};
use proptest::prelude::*;
use regex::Regex;

fn all_builtin_sets() -> Vec<RuleSet> {
    ["copy-buttons", "repair-joins", "empty-joins"]
        .iter()
        .map(|name| builtin(name).unwrap())
        .collect()
}

/// Literal rules over a tiny alphabet, so rules overlap and feed each other.
fn literal_rules() -> impl Strategy<Value = Vec<Rule>> {
    prop::collection::vec(("[ab]{1,3}", "[abc]{0,3}"), 1..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (search, replace))| Rule::literal(format!("r{idx}"), search, replace))
            .collect()
    })
}

fn pattern_rules() -> impl Strategy<Value = Vec<Rule>> {
    prop::collection::vec(("[ab]{1,2}[+*]?", "[abc]{0,3}"), 1..4).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (pattern, replace))| Rule::pattern(format!("p{idx}"), pattern, replace))
            .collect()
    })
}

/// Lines of a page with `log('..')` calls, some split by a raw line break.
fn call_document() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        "[a-z ]{0,8}",
        ("[a-z]{1,5}", "[a-z]{1,5}").prop_map(|(a, b)| format!("log('{a}\n{b}');")),
        ("[a-z]{1,5}", "[a-z]{1,5}").prop_map(|(a, b)| format!("log('{a}\\n{b}');")),
    ];
    prop::collection::vec(segment, 0..6).prop_map(|lines| lines.join("\n"))
}

/// Capture-expanding rules. Some templates keep the raw line break.
fn call_rule() -> impl Strategy<Value = (&'static str, &'static str)> {
    let split = r"log\('([a-z]+)\n([a-z]+)'\);";
    let spanning = r"log\('([a-z]+\s+[a-z]+)'\);";
    prop_oneof![
        Just((split, "log('$1\\n$2');")),
        Just((split, "log('$1\n$2');")),
        Just((split, "log(`${1}\n${2}`);")),
        Just((split, "log([$1, $2].join(' '));")),
        Just((spanning, "log('$1');")),
        Just((spanning, "info(\"$1\");")),
    ]
}

proptest! {
    #[test]
    fn rule_sets_are_idempotent(
        prefix in "[a-zA-Z ]{0,20}\n",
        suffix in "\n[a-zA-Z ]{0,20}",
    ) {
        let sets = all_builtin_sets();
        let document = format!("{prefix}{FIXTURE}{suffix}");

        let once = apply_rule_sets(&document, &sets);
        let twice = apply_rule_sets(&once.text, &sets);

        prop_assert_eq!(&twice.text, &once.text);
        prop_assert_eq!(twice.report.applied(), 0);
        prop_assert_eq!(twice.report.failed(), 0);
    }

    #[test]
    fn generated_literal_rules_are_idempotent(
        document in "[abc]{0,12}",
        rules in literal_rules(),
    ) {
        let once = apply_rules(&document, &rules);
        let twice = apply_rules(&once.text, &rules);

        prop_assert_eq!(&twice.text, &once.text);
        prop_assert_eq!(twice.report.applied(), 0);
    }

    #[test]
    fn generated_pattern_rules_are_idempotent(
        document in "[abc]{0,12}",
        rules in pattern_rules(),
    ) {
        let once = apply_rules(&document, &rules);
        let twice = apply_rules(&once.text, &rules);

        prop_assert_eq!(&twice.text, &once.text);
        prop_assert_eq!(twice.report.applied(), 0);
    }

    #[test]
    fn inserted_text_never_breaks_a_string(
        document in call_document(),
        (pattern, template) in call_rule(),
    ) {
        let rule = Rule::pattern("call", pattern, template).expanding();
        let re = Regex::new(pattern).unwrap();
        let fragments: Vec<String> = re
            .captures_iter(&document)
            .map(|caps| {
                let mut fragment = String::new();
                caps.expand(template, &mut fragment);
                fragment
            })
            .collect();

        let applied = apply_rules(&document, &[rule]);
        match applied.report.outcome("call") {
            Some(Ok(RuleOutcome::Applied { .. })) => {
                prop_assert!(fragments.iter().all(|f| check_fragment(f).is_ok()));
                prop_assert_ne!(&applied.text, &document);
            }
            Some(Err(RuleError::MalformedResult(_))) => {
                prop_assert_eq!(&applied.text, &document);
                prop_assert!(fragments.iter().any(|f| check_fragment(f).is_err()));
            }
            Some(Err(RuleError::NotFound { .. })) => {
                prop_assert!(fragments.is_empty());
                prop_assert_eq!(&applied.text, &document);
            }
            other => prop_assert!(false, "unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn normalize_is_idempotent(document in "[ab \t\n]{0,80}") {
        let once = normalize_whitespace(&document);
        prop_assert_eq!(normalize_whitespace(&once), once);
    }

    #[test]
    fn normalize_never_adds_lines(document in "[ab \n]{0,80}") {
        let normalized = normalize_whitespace(&document);
        prop_assert!(normalized.lines().count() <= document.lines().count());
    }
}
