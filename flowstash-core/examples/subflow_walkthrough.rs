//! Walks a login flow with a nested sub-flow through several requests.
//!
//! Each "request" restores the stash from the token produced by the previous
//! one, exactly as a stateless HTTP handler would.

use flowstash_core::prelude::*;

fn restore(token: &str) -> Result<Stash> {
    let stash = Stash::from_json_str(token)?;
    println!(
        "   restored: current={:?} queued={:?}",
        stash
            .last_state_from_history()?
            .map(|entry| entry.state.into_inner()),
        stash.scheduled_states().map(StateName::as_str).collect::<Vec<_>>()
    );
    Ok(stash)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🚀 Starting flowstash sub-flow walkthrough");

    // Request 1: the flow starts.
    let mut stash = Stash::new();
    stash.add_state_to_history("login_init", None, None)?;
    stash.set("email", "user@example.com")?;
    let token = stash.to_json_string()?;
    println!("\n📤 token after request 1: {token}");

    // Request 2: the password is accepted, a passcode sub-flow is queued in
    // front of the final "success" state.
    println!("\n📥 request 2");
    let mut stash = restore(&token)?;
    stash.add_scheduled_states(["passcode_confirmation", "success"])?;
    let next = stash.dequeue_next_scheduled_state()?;
    if let Some(state) = next {
        stash.add_state_to_history(state, None, Some(1))?;
    }
    let token = stash.to_json_string()?;
    println!("📤 token after request 2: {token}");

    // Request 3: a wrong passcode re-renders the same state.
    println!("\n📥 request 3");
    let mut stash = restore(&token)?;
    stash.add_state_to_history("passcode_confirmation", None, None)?;
    stash.set("passcode_attempts", 1)?;
    let token = stash.to_json_string()?;

    // Request 4: the user navigates back.
    println!("\n📥 request 4");
    let mut stash = restore(&token)?;
    let current = stash.revert_last_state()?;
    println!("   back to {:?}", current.as_ref().map(StateName::as_str));
    let token = stash.to_json_string()?;

    // Request 5: the password is submitted again and the flow runs to the end.
    println!("\n📥 request 5");
    let mut stash = restore(&token)?;
    stash.add_scheduled_states(["passcode_confirmation", "success"])?;
    while let Some(state) = stash.dequeue_next_scheduled_state()? {
        stash.add_state_to_history(state, None, None)?;
    }
    let token = stash.to_json_string()?;
    println!("📤 final token: {token}");

    let attempts: Option<u32> = stash.get_as("passcode_attempts")?;
    println!("\n📊 passcode attempts recorded: {attempts:?}");
    println!("✅ Walkthrough completed");

    Ok(())
}
