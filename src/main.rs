//! Front Desk Dialer - command line front end
//!
//! Places one outbound call and forwards in-call commands typed on stdin
//! (`m` mute, `t <number>` transfer, `h` hang up).
//!
//! Stdin is read through a single shared line reader, so lines piped in
//! ahead of time reach the purpose prompt and the in-call loop in order.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use frontdesk_dialer::api::{SupabaseClient, SupabaseRealtime};
use frontdesk_dialer::config::DialerConfig;
use frontdesk_dialer::models::{CallDirection, TransferTarget};
use frontdesk_dialer::phone::{
    CallHooks, CallModeToggles, CallPurpose, CallRequest, Dialer, DialerHandle, DialerParts,
    DialerTimings, PurposePrompt, Softphone, SoftphoneCredentials, SoftphoneError, SoftphoneHandle,
    SoftphoneSession,
};
use frontdesk_dialer::phone::normalize::format_for_display;
use frontdesk_dialer::state::{CallState, Notice};

const USAGE: &str = "usage:
  frontdesk-dialer numbers
  frontdesk-dialer recent
  frontdesk-dialer transfer-targets
  frontdesk-dialer register
  frontdesk-dialer call <number> [--from <caller id>] [--agent] [--sip] [--purpose <text>] [--goal <text>]";

/// Softphone stand-in for a build without a media stack.
struct NoMediaSoftphone;

#[async_trait]
impl Softphone for NoMediaSoftphone {
    async fn initialize(&self, _credentials: &SoftphoneCredentials) -> Result<(), SoftphoneError> {
        Err(SoftphoneError::Registration(
            "the command-line dialer has no audio; use callback or agent mode".to_string(),
        ))
    }

    fn is_registered(&self) -> bool {
        false
    }

    async fn make_call(
        &self,
        _destination: &str,
        _caller_id: &str,
        _display_name: &str,
        _hooks: CallHooks,
    ) -> Result<Box<dyn SoftphoneSession>, SoftphoneError> {
        Err(SoftphoneError::CallFailed("no media stack".to_string()))
    }

    fn set_mute(&self, _muted: bool) {}

    fn hangup(&self) {}

    fn is_call_active(&self) -> bool {
        false
    }
}

type StdinLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

fn stdin_lines() -> StdinLines {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

async fn read_line(input: &StdinLines, prompt: &str) -> Option<String> {
    println!("{}", prompt);
    let mut lines = input.lock().await;
    lines.next_line().await.ok().flatten().map(|l| l.trim().to_string())
}

/// Asks for an agent call's purpose and goal on stdin.
struct StdinPrompt {
    input: StdinLines,
}

#[async_trait]
impl PurposePrompt for StdinPrompt {
    async fn collect(&self, destination: &str) -> Option<CallPurpose> {
        println!("Agent call to {}", format_for_display(destination));
        let purpose = read_line(&self.input, "Purpose (empty to cancel):")
            .await
            .filter(|p| !p.is_empty())?;
        let goal = read_line(&self.input, "Goal:").await.unwrap_or_default();
        Some(CallPurpose {
            purpose: Some(purpose),
            goal: (!goal.is_empty()).then_some(goal),
            template_id: None,
        })
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn build_dialer(config: &DialerConfig, input: StdinLines) -> Result<Dialer> {
    let client = SupabaseClient::new(config).context("Failed to create Supabase client")?;
    let client = Arc::new(client);

    let softphone = || Arc::new(NoMediaSoftphone) as Arc<dyn Softphone>;

    Ok(Dialer::new(
        DialerParts {
            backend: client.clone(),
            directory: client.clone(),
            records: client,
            feed: Arc::new(SupabaseRealtime::new(config)),
            sip: Arc::new(SoftphoneHandle::new("SIP", Box::new(softphone))),
            trunk: Arc::new(SoftphoneHandle::new("external trunk", Box::new(softphone))),
            prompt: Arc::new(StdinPrompt { input }),
        },
        DialerTimings::from(config),
    ))
}

async fn list_numbers(handle: &DialerHandle) -> Result<()> {
    let candidates = handle.candidates().await?;
    if candidates.is_empty() {
        println!("No active numbers.");
    }
    for candidate in candidates {
        println!("{}", candidate.label);
    }
    Ok(())
}

async fn list_recent(handle: &DialerHandle) -> Result<()> {
    let recent = handle.recent_numbers().await?;
    if recent.is_empty() {
        println!("No recent numbers.");
    }
    for number in recent {
        let direction = match number.direction {
            Some(CallDirection::Outbound) => "outbound",
            Some(CallDirection::Inbound) => "inbound",
            None => "",
        };
        println!("{:<16} {}", format_for_display(&number.phone_number), direction);
    }
    Ok(())
}

fn print_transfer_targets(targets: &[TransferTarget]) {
    if targets.is_empty() {
        println!("No saved transfer numbers.");
    }
    for (i, target) in targets.iter().enumerate() {
        println!("#{} {}", i + 1, target.display_label());
    }
}

/// `#2` picks the second saved target; anything else is dialed as typed.
async fn transfer_destination(handle: &DialerHandle, target: &str) -> Result<String> {
    let Some(index) = target.strip_prefix('#') else {
        return Ok(target.to_string());
    };
    let index: usize = index.parse().context("expected #<n>")?;
    let targets = handle.transfer_targets().await?;
    match index.checked_sub(1).and_then(|i| targets.get(i)) {
        Some(saved) => Ok(saved.phone_number.clone()),
        None => bail!("no saved transfer number #{}", index),
    }
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Notification(n) => println!("[{}] {}", n.notification_type.label(), n.message),
        Notice::InsufficientCredits => println!("[error] Insufficient credits. Add credits to keep calling."),
        Notice::OwnNumberBlocked { number } => {
            println!("[error] {} is your own number", format_for_display(number))
        }
        Notice::LowBalance { balance } => println!("[warning] Your balance is {:.2}", balance),
        Notice::CallEnded { status, .. } => match status {
            Some(status) => println!("Call ended: {}", status.display_name()),
            None => println!("Call ended"),
        },
    }
}

async fn call(handle: &DialerHandle, args: &[String], input: StdinLines) -> Result<()> {
    let Some(destination) = args.get(2).filter(|a| !a.starts_with("--")) else {
        bail!("missing number\n{}", USAGE);
    };

    let toggles = CallModeToggles::new(
        args.iter().any(|a| a == "--agent"),
        args.iter().any(|a| a == "--sip"),
    );

    let purpose = flag_value(args, "--purpose");
    let goal = flag_value(args, "--goal");
    if purpose.is_some() || goal.is_some() {
        handle.pending_calls().stash(CallPurpose {
            purpose,
            goal,
            template_id: None,
        });
    }

    let mut request = CallRequest::new(destination.clone()).with_toggles(toggles);
    if let Some(from) = flag_value(args, "--from") {
        request = request.from_number(from);
    }

    let mut notices = handle.notices();
    let mut state = handle.watch_state();

    let notice_task = tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            print_notice(&notice);
        }
    });

    let result = handle.place_call(request).await;
    if let Err(e) = result {
        notice_task.abort();
        bail!("{}", e);
    }

    let mut stdin = input.lock().await;
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                println!("{}", current.display_name());
                if current == CallState::Idle {
                    break;
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    handle.hang_up().await;
                    break;
                };
                let line = line.trim();
                match line.split_once(' ').unwrap_or((line, "")) {
                    ("m", _) => {
                        let muted = handle.toggle_mute().await;
                        println!("{}", if muted { "Muted" } else { "Unmuted" });
                    }
                    ("t", target) if target.trim().is_empty() => {
                        match handle.transfer_targets().await {
                            Ok(targets) => print_transfer_targets(&targets),
                            Err(e) => println!("{}", e),
                        }
                    }
                    ("t", target) => {
                        let outcome = match transfer_destination(handle, target.trim()).await {
                            Ok(destination) => handle
                                .transfer(&destination)
                                .await
                                .map_err(anyhow::Error::from),
                            Err(e) => Err(e),
                        };
                        if let Err(e) = outcome {
                            println!("{}", e);
                        }
                    }
                    ("h", _) => handle.hang_up().await,
                    ("", _) => {}
                    _ => println!("commands: m | t [<number> | #<n>] | h"),
                }
            }
        }
    }

    notice_task.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("frontdesk_dialer=info".parse()?))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    let config = DialerConfig::from_env().context(
        "SUPABASE_URL, SUPABASE_ANON_KEY, SUPABASE_ACCESS_TOKEN and DIALER_USER_ID must be set",
    )?;
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    let input = stdin_lines();
    let (handle, task) = build_dialer(&config, input.clone())?.spawn();

    let outcome = match args.get(1).map(String::as_str) {
        Some("numbers") => list_numbers(&handle).await,
        Some("recent") => list_recent(&handle).await,
        Some("transfer-targets") => match handle.transfer_targets().await {
            Ok(targets) => {
                print_transfer_targets(&targets);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Some("register") => match handle.refresh_registration().await {
            Ok(status) => {
                println!("SIP: {}", status.display_status());
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Some("call") => call(&handle, &args, input).await,
        _ => {
            println!("{}", USAGE);
            Ok(())
        }
    };

    drop(handle);
    if let Err(e) = task.await {
        tracing::error!("Dialer task failed: {}", e);
    }
    outcome
}
