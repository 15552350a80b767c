use std::collections::{BTreeMap, BTreeSet};

use orgiam_core::config::PolicyConfig;
use orgiam_core::document::ASSUME_ROLE_WITH_SAML;
use orgiam_core::{
    Account, AccountMatcher, AccountRegistry, CompileError, ManagedPolicyReference,
    ReferenceResolver, TrustPolicyBuilder,
};
use yare::parameterized;

fn registry() -> AccountRegistry {
    AccountRegistry::new(vec![
        Account::new("master", "123456789012")
            .parent()
            .with_saml_provider("saml-provider-name"),
        Account::new("dev", "210987654321"),
        Account::new("prod", "555555555555"),
        Account::new("prod-eu", "666666666666"),
    ])
    .unwrap()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[parameterized(
    alone = { &["all"] },
    first = { &["all", "dev"] },
    last = { &["dev", "all"] },
    with_passthrough = { &["ec2.amazonaws.com", "all", "saml-provider-name"] },
)]
fn all_selects_every_account(tokens: &[&str]) {
    let registry = registry();
    assert_eq!(AccountMatcher::new(&registry).resolve(tokens).unwrap(), registry.all());
}

#[test]
fn children_is_all_but_parent() {
    let registry = registry();
    let mut expected = registry.all();
    expected.remove("master");
    assert_eq!(
        AccountMatcher::new(&registry).resolve(&["children"]).unwrap(),
        expected
    );
}

#[test]
fn parent_is_a_singleton() {
    let registry = registry();
    assert_eq!(
        AccountMatcher::new(&registry).resolve(&["parent"]).unwrap(),
        set(&["master"])
    );
}

#[test]
fn prefix_matching_selects_every_match() {
    let registry = registry();
    assert_eq!(
        AccountMatcher::new(&registry).resolve(&["prod"]).unwrap(),
        set(&["prod", "prod-eu"])
    );
}

#[test]
fn unknown_token_is_fatal() {
    let registry = registry();
    assert_eq!(
        AccountMatcher::new(&registry).resolve(&["qa"]),
        Err(CompileError::UnresolvedPattern("qa".into()))
    );
}

#[test]
fn literal_arns_pass_through_anywhere() {
    let registry = registry();
    let resolver =
        ReferenceResolver::new(&Default::default(), &AccountMatcher::new(&registry)).unwrap();
    let arn = "arn:aws:iam::123:policy/X";
    for account in registry.all() {
        assert_eq!(
            resolver.resolve_managed_policy(arn, &account, "anything"),
            Ok(ManagedPolicyReference::Literal { arn: arn.into() })
        );
    }
}

#[test]
fn local_policy_placement_is_enforced() {
    let registry = registry();
    let matcher = AccountMatcher::new(&registry);
    let policies: BTreeMap<String, PolicyConfig> = [(
        "LocalPolicy".to_string(),
        PolicyConfig::from_file("local.json").placed_in(&["prod"]),
    )]
    .into_iter()
    .collect();
    let resolver = ReferenceResolver::new(&policies, &matcher).unwrap();
    assert!(resolver.resolve_managed_policy("LocalPolicy", "prod-eu", "R").is_ok());
    assert_eq!(
        resolver.resolve_managed_policy("LocalPolicy", "dev", "R"),
        Err(CompileError::PolicyNotInAccount {
            policy: "LocalPolicy".into(),
            account: "dev".into(),
            entity: "R".into(),
        })
    );
}

#[parameterized(
    given_order = { &["123456789012", "saml-provider-name", "ec2.amazonaws.com"] },
    saml_first = { &["saml-provider-name", "ec2.amazonaws.com", "123456789012"] },
)]
fn saml_trust_is_last(trusts: &[&str]) {
    let registry = registry();
    let doc = TrustPolicyBuilder::new(AccountMatcher::new(&registry))
        .build(trusts)
        .unwrap();
    assert_eq!(doc.len(), 3);
    assert_eq!(doc.statement[2].action, ASSUME_ROLE_WITH_SAML);
    assert!(doc.statement[..2].iter().all(|s| s.action != ASSUME_ROLE_WITH_SAML));
}

#[test]
fn resolution_is_repeatable() {
    let registry = registry();
    let matcher = AccountMatcher::new(&registry);
    let tokens = ["children", "parent", "prod"];
    assert_eq!(matcher.resolve(&tokens), matcher.resolve(&tokens));
}
