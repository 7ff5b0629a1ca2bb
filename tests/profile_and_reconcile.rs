mod common;

use anyhow::{Result, anyhow};
use common::{Store, claims, plain_account, service};
use idlink::identity::{
    AccountStore, Claim, PromotionOutcome, ServiceError, StoreCapabilities, UserService,
    claims::types, reconcile,
};
use idlink::store::MemoryAccountStore;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
async fn profile_lists_claims_in_projection_order() -> Result<()> {
    let (store, service) = service(Store::new())?;
    let alice = plain_account(&store, "alice").await?;
    store.set_email(&alice.id, "a@x.com").await?.map_err(|r| anyhow!("{r}"))?;
    store
        .set_phone_number(&alice.id, "+15550000000")
        .await?
        .map_err(|r| anyhow!("{r}"))?;
    store
        .add_claim(&alice.id, Claim::new(types::NAME, "Alice"))
        .await?
        .map_err(|r| anyhow!("{r}"))?;
    store.add_to_role(&alice.id, "admin").await?.map_err(|r| anyhow!("{r}"))?;

    let profile = service.get_profile_data(&alice.id.to_string(), None).await?;
    let expected = claims(&[
        (types::SUBJECT, "1"),
        (types::EMAIL, "a@x.com"),
        (types::EMAIL_VERIFIED, "false"),
        (types::PHONE_NUMBER, "+15550000000"),
        (types::PHONE_NUMBER_VERIFIED, "false"),
        (types::NAME, "Alice"),
        (types::ROLE, "admin"),
    ]);
    assert_eq!(profile, expected);
    Ok(())
}

#[tokio::test]
async fn profile_filter_keeps_requested_types() -> Result<()> {
    let (store, service) = service(Store::new())?;
    let alice = plain_account(&store, "alice").await?;
    store.set_email(&alice.id, "a@x.com").await?.map_err(|r| anyhow!("{r}"))?;
    store.add_to_role(&alice.id, "admin").await?.map_err(|r| anyhow!("{r}"))?;
    store.add_to_role(&alice.id, "ops").await?.map_err(|r| anyhow!("{r}"))?;

    let requested = vec![types::ROLE.to_string(), "unknown".to_string()];
    let profile = service.get_profile_data("1", Some(requested.as_slice())).await?;
    assert_eq!(profile, claims(&[(types::ROLE, "admin"), (types::ROLE, "ops")]));

    // An empty filter means every claim.
    let everything = service
        .get_profile_data("1", Some::<&[String]>(&[]))
        .await?;
    assert_eq!(everything.len(), 5);
    Ok(())
}

#[tokio::test]
async fn minimal_store_projects_only_the_subject() -> Result<()> {
    let (store, service) = service(Store::new().with_capabilities(StoreCapabilities::none()))?;
    let alice = plain_account(&store, "alice").await?;

    let profile = service.get_profile_data(&alice.id.to_string(), None).await?;
    assert_eq!(profile, claims(&[(types::SUBJECT, "1")]));
    Ok(())
}

#[tokio::test]
async fn unknown_subject_profile_is_not_found() -> Result<()> {
    let (_store, service) = service(Store::new())?;
    let err = service
        .get_profile_data("not-a-number", None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected NotFound"))?;
    assert!(matches!(err, ServiceError::NotFound(subject) if subject == "not-a-number"));
    Ok(())
}

#[tokio::test]
async fn is_active_tracks_existing_accounts() -> Result<()> {
    let (store, service) = service(Store::new())?;
    let alice = plain_account(&store, "alice").await?;

    assert!(service.is_active(&alice.id.to_string()).await?);
    assert!(!service.is_active("999").await?);
    assert!(!service.is_active("garbage").await?);
    assert!(!service.is_active("").await?);
    Ok(())
}

#[tokio::test]
async fn uuid_keys_parse_malformed_subjects_to_nil() -> Result<()> {
    let store = Arc::new(MemoryAccountStore::<Uuid>::new());
    let service = UserService::new(store.clone())?;
    let account = store
        .create(idlink::identity::NewAccount::new("alice"))
        .await?
        .map_err(|r| anyhow!("{r}"))?;

    assert!(service.is_active(&account.id.to_string()).await?);
    assert!(!service.is_active("not-a-uuid").await?);
    Ok(())
}

#[tokio::test]
async fn explicit_subject_parser_is_used() -> Result<()> {
    let store = Arc::new(Store::new());
    let service = UserService::builder(store.clone())
        .subject_parser(Arc::new(|subject: &str| {
            subject
                .strip_prefix("user-")
                .and_then(|id| id.parse().ok())
                .unwrap_or(0)
        }))
        .build()?;
    plain_account(&store, "alice").await?;

    assert!(service.is_active("user-1").await?);
    assert!(!service.is_active("1").await?);
    Ok(())
}

#[tokio::test]
async fn reconciliation_persists_only_new_pairs() -> Result<()> {
    let store = Store::new();
    let alice = plain_account(&store, "alice").await?;
    for claim in [Claim::new("locale", "fr"), Claim::new("group", "a")] {
        store.add_claim(&alice.id, claim).await?.map_err(|r| anyhow!("{r}"))?;
    }

    let asserted = claims(&[
        ("locale", "fr"),
        ("locale", "FR"),
        ("group", "a"),
        ("group", "b"),
        ("group", "b"),
    ]);
    let outcome = reconcile::update_from_external_claims(&store, &alice.id, &asserted).await?;
    assert_eq!(outcome, None);

    assert_eq!(
        store.claims(&alice.id).await?,
        claims(&[
            ("locale", "fr"),
            ("group", "a"),
            ("locale", "FR"),
            ("group", "b"),
        ])
        .into_vec()
    );
    Ok(())
}

#[tokio::test]
async fn reconciliation_of_nothing_is_a_no_op() -> Result<()> {
    let store = Store::new();
    let alice = plain_account(&store, "alice").await?;

    let outcome = reconcile::update_from_external_claims(&store, &alice.id, &claims(&[])).await?;
    assert_eq!(outcome, None);
    assert!(store.claims(&alice.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn promotion_is_a_no_op_when_email_exists() -> Result<()> {
    let store = Store::new();
    let alice = plain_account(&store, "alice").await?;
    store.set_email(&alice.id, "old@x.com").await?.map_err(|r| anyhow!("{r}"))?;

    let asserted = claims(&[(types::EMAIL, "new@x.com"), (types::EMAIL_VERIFIED, "true")]);
    let promotion = reconcile::promote_email(&store, &alice.id, asserted.clone()).await?;

    assert_eq!(promotion.outcome, PromotionOutcome::Skipped);
    assert_eq!(promotion.remaining, asserted);
    let account = store
        .find_by_id(&alice.id)
        .await?
        .ok_or_else(|| anyhow!("account missing"))?;
    assert_eq!(account.email.as_deref(), Some("old@x.com"));
    assert!(!account.email_confirmed);
    Ok(())
}

#[tokio::test]
async fn promotion_reports_benign_rejection() -> Result<()> {
    let store = Store::new();
    let alice = plain_account(&store, "alice").await?;

    let asserted = claims(&[(types::EMAIL, "not-an-email")]);
    let promotion = reconcile::promote_email(&store, &alice.id, asserted.clone()).await?;

    match promotion.outcome {
        PromotionOutcome::RejectedBenign(error) => assert_eq!(error.code, "InvalidEmail"),
        other => return Err(anyhow!("unexpected outcome {other:?}")),
    }
    assert_eq!(promotion.remaining, asserted);
    Ok(())
}

#[tokio::test]
async fn verified_promotion_is_applied_and_confirmed() -> Result<()> {
    let store = Store::new();
    let alice = plain_account(&store, "alice").await?;

    let promotion = reconcile::promote_phone(
        &store,
        &alice.id,
        claims(&[
            (types::PHONE_NUMBER, "+15550000000"),
            (types::PHONE_NUMBER_VERIFIED, "true"),
            (types::NAME, "Alice"),
        ]),
    )
    .await?;

    assert_eq!(promotion.outcome, PromotionOutcome::Applied { confirmed: true });
    assert_eq!(promotion.remaining, claims(&[(types::NAME, "Alice")]));
    Ok(())
}
