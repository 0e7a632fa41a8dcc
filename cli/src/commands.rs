use crate::context::AppContext;
use crate::output::{
    backer_line, detail_lines, eligibility_line, job_line, pledge_line, print_json, project_row,
};
use crate::{Cli, Commands, ConfigCommands};
use anyhow::{anyhow, bail, Context, Result};
use chain::rpc::signer_address;
use chrono::Utc;
use edge::ipfs::MetadataUploader;
use fundr_core::{
    format::{format_eth, DEFAULT_ETH_DECIMALS},
    units::to_eth,
    validation::{self, ensure_address, validate_pledge_amount},
    ActionEligibility, CampaignAction, CampaignForm, CampaignMetadataDocument, DataSource,
    ProjectDetail, ProjectSummary, SortKey,
};
use projects::Explorer;
use queue::{JobRecord, JobState};
use serde::Serialize;

const SUBMISSION_FAILED: &str = "Transaction submission failed, please try again later.";
const CONNECT_TO_SUPPORT: &str = "Please connect your wallet before supporting the project.";
const CONNECT_TO_OPERATE: &str = "Please connect your wallet before operating.";
const CONNECT_TO_CREATE: &str = "Please connect your wallet before creating a project.";
const PROJECT_NOT_FOUND: &str = "Project not found.";

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Explore {
            sort,
            limit,
            cursor,
            pages,
            all,
        } => {
            let pages = if all { None } else { Some(pages) };
            explore(&AppContext::load()?, sort, limit, cursor, pages, json).await
        }
        Commands::Show { id, viewer } => show(&AppContext::load()?, &id, viewer, json).await,
        Commands::Backers { id } => backers(&AppContext::load()?, &id, json).await,
        Commands::Account { address } => account(&AppContext::load()?, address, json).await,
        Commands::Pledge { id, amount } => pledge(&AppContext::load()?, &id, &amount, json).await,
        Commands::Unpledge { id, amount } => {
            unpledge(&AppContext::load()?, &id, amount.as_deref(), json).await
        }
        Commands::Refund { id } => refund(&AppContext::load()?, &id, json).await,
        Commands::Finalize { id } => finalize(&AppContext::load()?, &id, json).await,
        Commands::Create {
            title,
            tagline,
            description,
            goal,
            deadline,
            category,
            cover,
            milestone,
            dry_run,
        } => {
            let form = CampaignForm {
                title,
                tagline,
                description,
                goal,
                deadline,
                category,
                cover,
                milestone: milestone.join("\n"),
            };
            create(&AppContext::load()?, form, dry_run, json).await
        }
        Commands::Jobs => jobs(json),
        Commands::Config { command } => config_command(command, json),
    }
}

#[derive(Serialize)]
struct ExploreOutput<'a> {
    projects: &'a [ProjectSummary],
    cursor: u64,
    next_cursor: Option<u64>,
    has_more: bool,
    total: u64,
    source: DataSource,
}

/// `pages` of `None` loads until the listing is exhausted.
async fn explore(
    ctx: &AppContext,
    sort: SortKey,
    limit: Option<u32>,
    cursor: u64,
    pages: Option<u32>,
    json: bool,
) -> Result<()> {
    let mut explorer = Explorer::new(ctx.service.clone())
        .with_limit(limit.unwrap_or(ctx.cfg.fetch.page_limit))
        .with_sort(sort);

    explorer.load_page(cursor, true).await;
    let mut loaded = 1;
    while explorer.has_more && !explorer.is_error && pages.map_or(true, |max| loaded < max) {
        explorer.load_more().await;
        loaded += 1;
    }

    if explorer.is_error && explorer.projects.is_empty() {
        bail!("Failed to load projects. Please try again later.");
    }

    if json {
        return print_json(&ExploreOutput {
            projects: &explorer.projects,
            cursor: explorer.cursor,
            next_cursor: explorer.next_cursor,
            has_more: explorer.has_more,
            total: explorer.total,
            source: explorer.source,
        });
    }

    if explorer.projects.is_empty() {
        println!("No projects yet.");
        return Ok(());
    }
    let now = Utc::now();
    for project in &explorer.projects {
        println!("{}", project_row(project, now));
    }
    if explorer.has_more {
        if let Some(next) = explorer.next_cursor {
            println!("More projects available: --cursor {}", next);
        }
    }
    Ok(())
}

async fn load_detail(ctx: &AppContext, id: &str) -> Result<ProjectDetail> {
    ctx.service
        .fetch_project_detail(id)
        .await
        .ok_or_else(|| anyhow!(PROJECT_NOT_FOUND))
}

#[derive(Serialize)]
struct ShowOutput {
    project: ProjectDetail,
    viewer: Option<String>,
    pledge_wei: Option<u128>,
    eligibility: Option<ActionEligibility>,
}

async fn show(ctx: &AppContext, id: &str, viewer: Option<String>, json: bool) -> Result<()> {
    let project = load_detail(ctx, id).await?;
    let viewer = match viewer {
        Some(v) => Some(ensure_address(&v).ok_or_else(|| anyhow!("Invalid address {}", v))?),
        None => ctx.wallet_address(),
    };

    let pledge_wei = match &viewer {
        Some(v) if ctx.service.has_chain() => match ctx.service.pledge_of(&project.id, v).await {
            Ok(wei) => Some(wei),
            Err(e) => {
                tracing::warn!(campaign = %project.id, error = %e, "Failed to read pledge");
                None
            }
        },
        _ => None,
    };
    let eligibility = viewer.as_deref().map(|v| {
        ActionEligibility::evaluate(&project, pledge_wei.unwrap_or(0), Some(v), Utc::now())
    });

    if json {
        return print_json(&ShowOutput {
            project,
            viewer,
            pledge_wei,
            eligibility,
        });
    }

    for line in detail_lines(&project, Utc::now()) {
        println!("{}", line);
    }
    if let Some(wei) = pledge_wei.filter(|w| *w > 0) {
        println!();
        println!("{}", pledge_line(wei));
    }
    if let Some(eligibility) = &eligibility {
        println!("{}", eligibility_line(eligibility));
    }
    Ok(())
}

async fn backers(ctx: &AppContext, id: &str, json: bool) -> Result<()> {
    let project = load_detail(ctx, id).await?;
    let backers = ctx.service.fetch_backers(&project.id).await;
    if json {
        return print_json(&backers);
    }
    if backers.is_empty() {
        println!("No backers yet.");
        return Ok(());
    }
    for backer in &backers {
        println!("{}", backer_line(backer));
    }
    Ok(())
}

async fn account(ctx: &AppContext, address: Option<String>, json: bool) -> Result<()> {
    let address = match address.or_else(|| ctx.wallet_address()) {
        Some(address) => address,
        None => bail!("Please connect your wallet to view your account."),
    };
    let overview = ctx.service.account_overview(&address).await?;
    if json {
        return print_json(&overview);
    }

    let now = Utc::now();
    println!("Account {}", overview.address);
    println!(
        "Total pledged: {}",
        format_eth(to_eth(overview.total_pledged_wei), DEFAULT_ETH_DECIMALS, true)
    );
    println!(
        "Total raised:  {}",
        format_eth(to_eth(overview.total_raised_wei), DEFAULT_ETH_DECIMALS, true)
    );

    println!();
    println!("Created ({})", overview.created.len());
    for project in &overview.created {
        println!("  {}", project_row(project, now));
    }
    println!();
    println!("Supported ({})", overview.pledged.len());
    for pledged in &overview.pledged {
        println!("  {}  pledged {} ETH", project_row(&pledged.project, now), pledged.pledge);
    }
    Ok(())
}

/// Check the viewer's eligibility against the current campaign state.
async fn eligibility_for(ctx: &AppContext, project: &ProjectDetail) -> Result<(ActionEligibility, u128)> {
    let viewer = ctx.wallet_address();
    let pledge_wei = match &viewer {
        Some(v) => ctx.service.pledge_of(&project.id, v).await?,
        None => 0,
    };
    Ok((
        ActionEligibility::evaluate(project, pledge_wei, viewer.as_deref(), Utc::now()),
        pledge_wei,
    ))
}

async fn pledge(ctx: &AppContext, id: &str, amount: &str, json: bool) -> Result<()> {
    let amount_wei = validate_pledge_amount(amount)?;
    ctx.init_queue(CONNECT_TO_SUPPORT)?;
    let project = load_detail(ctx, id).await?;
    let (eligibility, _) = eligibility_for(ctx, &project).await?;
    if !eligibility.can_pledge {
        bail!("This project is no longer accepting support.");
    }

    let job = queue::submit_action(&CampaignAction::Pledge {
        campaign: project.id,
        amount_wei,
    })
    .await?;
    report(job, json)
}

async fn unpledge(ctx: &AppContext, id: &str, amount: Option<&str>, json: bool) -> Result<()> {
    ctx.init_queue(CONNECT_TO_OPERATE)?;
    let project = load_detail(ctx, id).await?;
    let (eligibility, pledge_wei) = eligibility_for(ctx, &project).await?;
    if pledge_wei == 0 {
        bail!("No pledge to unpledge.");
    }
    if !eligibility.can_unpledge {
        bail!("Pledges can only be withdrawn while the project is in progress.");
    }

    let amount_wei = match amount {
        Some(amount) => validate_pledge_amount(amount)?,
        None => pledge_wei,
    };
    if amount_wei > pledge_wei {
        bail!("You cannot unpledge more than you have pledged.");
    }

    let job = queue::submit_action(&CampaignAction::Unpledge {
        campaign: project.id,
        amount_wei,
    })
    .await?;
    report(job, json)
}

async fn refund(ctx: &AppContext, id: &str, json: bool) -> Result<()> {
    ctx.init_queue(CONNECT_TO_OPERATE)?;
    let project = load_detail(ctx, id).await?;
    let (eligibility, _) = eligibility_for(ctx, &project).await?;
    if !eligibility.can_refund {
        bail!("Refunds are only available for pledges to projects that missed their goal.");
    }

    let job = queue::submit_action(&CampaignAction::Refund { campaign: project.id }).await?;
    report(job, json)
}

async fn finalize(ctx: &AppContext, id: &str, json: bool) -> Result<()> {
    ctx.init_queue(CONNECT_TO_OPERATE)?;
    let project = load_detail(ctx, id).await?;
    let (eligibility, _) = eligibility_for(ctx, &project).await?;
    if !eligibility.can_finalize {
        bail!("Only the creator can claim funds once the project has ended and reached its goal.");
    }

    let job = queue::submit_action(&CampaignAction::Finalize { campaign: project.id }).await?;
    report(job, json)
}

async fn create(ctx: &AppContext, form: CampaignForm, dry_run: bool, json: bool) -> Result<()> {
    let now = Utc::now();
    let validated = validation::validate(&form, now).map_err(|errs| {
        anyhow!(errs
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    })?;
    let document = CampaignMetadataDocument::build(&form, validated.goal_wei, validated.deadline, now);

    if dry_run {
        println!("{}", document.to_json_pretty()?);
        return Ok(());
    }

    let factory = ctx
        .cfg
        .network
        .factory
        .as_deref()
        .and_then(ensure_address)
        .context("Factory address is not configured or invalid.")?;
    let upload_url = ctx
        .cfg
        .network
        .metadata_upload_url
        .clone()
        .context("Metadata upload URL is not configured.")?;
    ctx.init_queue(CONNECT_TO_CREATE)?;

    let metadata_uri = MetadataUploader::new(upload_url).upload(&document).await?;
    let job = queue::submit_action(&CampaignAction::CreateCampaign {
        factory,
        goal_wei: validated.goal_wei,
        deadline: validated.deadline,
        metadata_uri,
    })
    .await?;

    if job.state == JobState::Confirmed && !json {
        match &job.created_campaign {
            Some(address) => println!("Project created at {}", address),
            None => println!("Project created. It will appear once the indexer picks it up."),
        }
    }
    report(job, json)
}

/// Print a finished job, or fail with its error.
fn report(job: JobRecord, json: bool) -> Result<()> {
    if json {
        print_json(&job)?;
    }
    match job.state {
        JobState::Confirmed => {
            if !json {
                println!("Transaction confirmed.");
                if let Some(tx) = &job.tx_hash {
                    println!("Transaction hash: {}", tx);
                }
            }
            Ok(())
        }
        _ => Err(anyhow!(job.last_error.unwrap_or_else(|| SUBMISSION_FAILED.to_string()))),
    }
}

fn jobs(json: bool) -> Result<()> {
    let jobs = queue::list_status(queue::DEFAULT_DB_PATH)?;
    if json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        println!("No transactions yet.");
    }
    for job in &jobs {
        println!("{}", job_line(job));
    }
    Ok(())
}

fn config_command(command: ConfigCommands, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let cfg = config::load()?;
            if json {
                print_json(&cfg)
            } else {
                println!("{}", cfg.to_pretty_json()?);
                Ok(())
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut cfg = config::load_stored()?;
            cfg.set(&key, &value)?;
            config::store(&cfg)?;
            tracing::info!(%key, "Config updated");
            Ok(())
        }
        ConfigCommands::SetKey { key } => {
            let address = signer_address(&key)?;
            config::store_private_key(&key)?;
            tracing::info!(%address, "Wallet key stored in keychain");
            Ok(())
        }
        ConfigCommands::DeleteKey => {
            config::delete_private_key()?;
            tracing::info!("Wallet key removed from keychain");
            Ok(())
        }
    }
}
