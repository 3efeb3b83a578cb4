//! Protocol scenarios shared by the backend integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use chrono::Duration;

use rememberme_core::{
    Authenticator, CookieSource, LoginOutcome, MemoryCookie, Triplet,
    TripletLookup, TripletStorage,
};

pub const CREDENTIAL: &str = "alice@example.org";
pub const OTHER_CREDENTIAL: &str = "bob@example.org";
pub const SALT: &str = "integration-salt";

pub fn authenticator(storage: Arc<dyn TripletStorage>) -> Authenticator {
    Authenticator::new(storage).with_salt(SALT)
}

/// Issue a cookie and hand it back as the next request would carry it.
pub async fn issue(auth: &Authenticator, credential: &str) -> Result<MemoryCookie> {
    let mut cookie = MemoryCookie::new();
    auth.create_cookie(credential, &mut cookie).await?;
    Ok(next_request(&cookie))
}

/// Fresh transport carrying whatever the previous response left behind.
pub fn next_request(cookie: &MemoryCookie) -> MemoryCookie {
    MemoryCookie::with_value(cookie.value().unwrap_or_default())
}

fn parsed(cookie: &MemoryCookie) -> Result<Triplet> {
    let value = cookie.value().context("cookie has no value")?;
    Ok(Triplet::parse(value))
}

async fn lookup(storage: &dyn TripletStorage, triplet: &Triplet) -> Result<TripletLookup> {
    Ok(storage
        .find_triplet(
            triplet.credential(),
            &triplet.salted_one_time_token(SALT),
            &triplet.salted_persistent_token(SALT),
        )
        .await?)
}

pub async fn no_cookie_is_reported(storage: Arc<dyn TripletStorage>) -> Result<()> {
    let auth = authenticator(storage);
    let mut cookie = MemoryCookie::new();

    let result = auth.login(&mut cookie).await?;

    ensure!(!result.cookie_exists());
    ensure!(result.outcome() == LoginOutcome::NoCookie);
    ensure!(cookie.writes().is_empty() && !cookie.was_deleted());
    Ok(())
}

pub async fn success_rotates_one_time_token(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage.clone());
    let mut cookie = issue(&auth, CREDENTIAL).await?;
    let before = parsed(&cookie)?;

    let result = auth.login(&mut cookie).await?;
    ensure!(result.is_success(), "expected success, got {}", result.outcome());
    ensure!(result.credential() == Some(CREDENTIAL));

    let after = parsed(&cookie)?;
    ensure!(after.is_valid());
    ensure!(after.credential() == before.credential());
    ensure!(after.persistent_token() == before.persistent_token());
    ensure!(after.one_time_token() != before.one_time_token());

    ensure!(lookup(storage.as_ref(), &before).await? == TripletLookup::Invalid);
    ensure!(lookup(storage.as_ref(), &after).await? == TripletLookup::Found);

    let mut again = next_request(&cookie);
    ensure!(auth.login(&mut again).await?.is_success());
    Ok(())
}

pub async fn rotation_disabled_keeps_the_triplet(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage).with_token_rotation(false);
    let mut cookie = issue(&auth, CREDENTIAL).await?;
    let before = cookie.value().map(str::to_string);

    ensure!(auth.login(&mut cookie).await?.is_success());
    ensure!(cookie.writes().len() == 1);
    ensure!(cookie.value().map(str::to_string) == before);

    let mut again = next_request(&cookie);
    ensure!(auth.login(&mut again).await?.is_success());
    Ok(())
}

pub async fn replay_purges_every_device(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage);
    let laptop = issue(&auth, CREDENTIAL).await?;
    let mut phone = issue(&auth, CREDENTIAL).await?;
    let mut bystander = issue(&auth, OTHER_CREDENTIAL).await?;

    // The legitimate laptop logs in and rotates; the stolen copy is replayed.
    let mut legit = next_request(&laptop);
    ensure!(auth.login(&mut legit).await?.is_success());

    let mut stolen = next_request(&laptop);
    let result = auth.login(&mut stolen).await?;
    ensure!(result.has_possible_manipulation());
    ensure!(result.outcome() == LoginOutcome::Manipulation);
    ensure!(stolen.was_deleted());
    ensure!(stolen.value().is_none());

    let phone_result = auth.login(&mut phone).await?;
    ensure!(phone_result.is_expired(), "phone should be logged out");
    ensure!(phone.was_deleted());

    let mut rotated = next_request(&legit);
    ensure!(auth.login(&mut rotated).await?.is_expired());

    ensure!(auth.login(&mut bystander).await?.is_success());
    Ok(())
}

pub async fn unknown_cookie_is_expired(storage: Arc<dyn TripletStorage>) -> Result<()> {
    let auth = authenticator(storage);
    let mut cookie = MemoryCookie::with_value(format!(
        "{CREDENTIAL}|never-issued|unknown-device"
    ));

    let result = auth.login(&mut cookie).await?;

    ensure!(result.is_expired());
    ensure!(result.cookie_exists());
    ensure!(cookie.was_deleted());
    Ok(())
}

pub async fn elapsed_lifetime_is_expired(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage).with_expire_time(Duration::seconds(-5));
    let mut cookie = issue(&auth, CREDENTIAL).await?;

    let result = auth.login(&mut cookie).await?;

    ensure!(result.is_expired(), "got {}", result.outcome());
    ensure!(cookie.was_deleted());
    Ok(())
}

pub async fn logout_is_idempotent(storage: Arc<dyn TripletStorage>) -> Result<()> {
    let auth = authenticator(storage);
    let mut cookie = issue(&auth, CREDENTIAL).await?;
    let mut other_device = issue(&auth, CREDENTIAL).await?;
    let mut copy = next_request(&cookie);

    ensure!(auth.clear_cookie(&mut cookie).await?);
    ensure!(cookie.value().is_none());
    ensure!(!auth.clear_cookie(&mut cookie).await?);
    ensure!(!auth.clear_cookie(&mut MemoryCookie::new()).await?);

    ensure!(auth.login(&mut copy).await?.is_expired());
    ensure!(auth.login(&mut other_device).await?.is_success());
    Ok(())
}

pub async fn credential_may_contain_separator(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage);
    let credential = "tenant|alice";
    let mut cookie = issue(&auth, credential).await?;

    let result = auth.login(&mut cookie).await?;

    ensure!(result.credential() == Some(credential));
    Ok(())
}

pub async fn salt_is_part_of_the_key(storage: Arc<dyn TripletStorage>) -> Result<()> {
    let issuing = authenticator(storage.clone());
    let mut cookie = issue(&issuing, CREDENTIAL).await?;

    let other_salt = Authenticator::new(storage).with_salt("different");
    ensure!(other_salt.login(&mut cookie).await?.is_expired());
    Ok(())
}

pub async fn sweep_removes_only_expired(storage: Arc<dyn TripletStorage>) -> Result<()> {
    let expired = authenticator(storage.clone()).with_expire_time(Duration::seconds(-60));
    let live = authenticator(storage.clone());
    let stale = issue(&expired, CREDENTIAL).await?;
    let mut fresh = issue(&live, CREDENTIAL).await?;

    storage.clean_expired_tokens(chrono::Utc::now()).await?;

    ensure!(lookup(storage.as_ref(), &parsed(&stale)?).await? == TripletLookup::NotFound);
    ensure!(live.login(&mut fresh).await?.is_success());
    Ok(())
}

/// Racing rotations of one device leave exactly one of the written tokens
/// live.
pub async fn concurrent_replacements_keep_one_token(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    const WRITERS: usize = 8;
    let persistent = "shared-device";
    let expires = chrono::Utc::now() + Duration::hours(1);
    storage
        .store_triplet(CREDENTIAL, "initial", persistent, expires)
        .await?;

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage
                .replace_triplet(CREDENTIAL, &format!("token-{writer}"), persistent, expires)
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let mut found = 0;
    for writer in 0..WRITERS {
        match storage
            .find_triplet(CREDENTIAL, &format!("token-{writer}"), persistent)
            .await?
        {
            TripletLookup::Found => found += 1,
            TripletLookup::Invalid => {}
            TripletLookup::NotFound => anyhow::bail!("record vanished during replace"),
        }
    }
    ensure!(found == 1, "expected exactly one live token, found {found}");
    ensure!(
        storage.find_triplet(CREDENTIAL, "initial", persistent).await?
            == TripletLookup::Invalid
    );
    Ok(())
}

/// A double-submitted request with one cookie never surfaces a storage
/// error; each copy either succeeds or is flagged.
pub async fn concurrent_double_login_is_consistent(
    storage: Arc<dyn TripletStorage>,
) -> Result<()> {
    let auth = authenticator(storage);
    let cookie = issue(&auth, CREDENTIAL).await?;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let auth = auth.clone();
        let mut copy = next_request(&cookie);
        handles.push(tokio::spawn(async move {
            let result = auth.login(&mut copy).await?;
            Ok::<_, anyhow::Error>(result.outcome())
        }));
    }
    for handle in handles {
        let outcome = handle.await??;
        ensure!(
            matches!(outcome, LoginOutcome::Success | LoginOutcome::Manipulation),
            "unexpected outcome {outcome}"
        );
    }
    Ok(())
}

/// Run every scenario above against backends built by `make`.
pub async fn run_all<F, Fut>(make: F) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Arc<dyn TripletStorage>>>,
{
    no_cookie_is_reported(make().await?).await.context("no cookie")?;
    success_rotates_one_time_token(make().await?)
        .await
        .context("rotation")?;
    rotation_disabled_keeps_the_triplet(make().await?)
        .await
        .context("rotation disabled")?;
    replay_purges_every_device(make().await?)
        .await
        .context("replay")?;
    unknown_cookie_is_expired(make().await?)
        .await
        .context("unknown cookie")?;
    elapsed_lifetime_is_expired(make().await?)
        .await
        .context("expiry")?;
    logout_is_idempotent(make().await?).await.context("logout")?;
    credential_may_contain_separator(make().await?)
        .await
        .context("separator in credential")?;
    salt_is_part_of_the_key(make().await?).await.context("salt")?;
    sweep_removes_only_expired(make().await?)
        .await
        .context("sweep")?;
    concurrent_replacements_keep_one_token(make().await?)
        .await
        .context("concurrent replace")?;
    concurrent_double_login_is_consistent(make().await?)
        .await
        .context("concurrent double login")?;
    Ok(())
}
