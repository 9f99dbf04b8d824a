use std::path::Path;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::app::{AppContext, Result, StorylineError};
use crate::domain::{NewStory, Story};
use crate::paging::LoadOutcome;
use crate::result::ResultState;

/// Drive an operation to its terminal state, printing progress.
async fn finish<T>(label: &str, mut states: BoxStream<'static, ResultState<T>>) -> Result<T> {
    while let Some(state) = states.next().await {
        match state {
            ResultState::Loading => println!("{}...", label),
            ResultState::Success(value) => return Ok(value),
            ResultState::Error(error) => return Err(StorylineError::Other(error.to_string())),
        }
    }
    Err(StorylineError::Other(format!("{} ended without a result", label)))
}

fn require_login(ctx: &AppContext) -> Result<()> {
    if ctx.repository.is_logged_in().get() {
        Ok(())
    } else {
        Err(StorylineError::Other(
            "Not logged in. Run `storyline login` first".into(),
        ))
    }
}

fn print_story(index: usize, story: &Story) {
    let date = story.created_at.format("%Y-%m-%d");
    let pin = if story.has_location() { " @" } else { "" };
    println!(
        "{:>3}. {} {}{}\n     {}\n     {}",
        index + 1,
        date,
        story.name,
        pin,
        story.display_description(),
        story.id
    );
}

pub async fn register(ctx: &AppContext, name: &str, email: &str, password: &str) -> Result<()> {
    let response = finish("Registering", ctx.repository.register(name, email, password)).await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn login(ctx: &AppContext, email: &str, password: &str) -> Result<()> {
    let login = finish("Logging in", ctx.repository.login(email, password)).await?;
    println!("Logged in as {}", login.name);
    Ok(())
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    ctx.repository.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn whoami(ctx: &AppContext) -> Result<()> {
    let session = ctx.repository.session();
    if session.logged_in {
        println!("{} ({})", session.name, session.user_id);
    } else {
        println!("Not logged in");
    }
    print_settings(ctx);
    Ok(())
}

pub async fn feed(ctx: &AppContext, refresh: bool, more: bool) -> Result<()> {
    require_login(ctx)?;
    let pager = ctx.repository.feed()?;

    let outcome = if refresh {
        Some(pager.refresh().await)
    } else {
        pager.open().await
    };
    report(outcome);

    if more {
        report(Some(pager.load_more().await));
    }

    let stories = pager.snapshot()?;
    if stories.is_empty() {
        println!("No stories");
        return Ok(());
    }

    for (index, story) in stories.iter().enumerate() {
        print_story(index, story);
    }
    if pager.has_more() {
        println!("\nMore stories available: storyline feed --more");
    }

    Ok(())
}

fn report(outcome: Option<LoadOutcome>) {
    match outcome {
        Some(LoadOutcome::Applied { inserted, .. }) => {
            tracing::debug!("Loaded {} stories", inserted);
        }
        Some(LoadOutcome::Failed(error)) => {
            eprintln!("Could not load stories: {}", error);
        }
        Some(LoadOutcome::Skipped(reason)) => {
            tracing::debug!("Load skipped: {:?}", reason);
        }
        Some(LoadOutcome::Superseded) | None => {}
    }
}

pub async fn show(ctx: &AppContext, id: &str) -> Result<()> {
    require_login(ctx)?;
    let story = finish("Loading story", ctx.repository.story_detail(id)).await?;

    println!("{}", story.name);
    println!("{}", story.created_at.format("%Y-%m-%d %H:%M"));
    println!("{}", story.photo_url);
    if let Some((lat, lon)) = story.location() {
        println!("Location: {:.5}, {:.5}", lat, lon);
    }
    println!("\n{}", story.display_description());
    Ok(())
}

pub async fn upload(
    ctx: &AppContext,
    photo: &Path,
    description: &str,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<()> {
    require_login(ctx)?;
    let bytes = std::fs::read(photo)?;
    let file_name = photo
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());

    let story = NewStory {
        photo: bytes,
        file_name,
        description: description.to_string(),
        lat,
        lon,
    };

    let response = finish("Uploading", ctx.repository.upload_story(story)).await?;
    println!("{}", response.message);
    Ok(())
}

pub async fn map(ctx: &AppContext) -> Result<()> {
    require_login(ctx)?;
    let stories = finish("Loading locations", ctx.repository.stories_with_location()).await?;

    if stories.is_empty() {
        println!("No stories with a location");
        return Ok(());
    }

    for story in stories {
        if let Some((lat, lon)) = story.location() {
            println!("{:>10.5} {:>11.5}  {}  {}", lat, lon, story.name, story.id);
        }
    }
    Ok(())
}

pub fn set_dark_mode(ctx: &AppContext, enabled: bool) -> Result<()> {
    ctx.repository.set_dark_mode(enabled)?;
    print_settings(ctx);
    Ok(())
}

pub fn set_language(ctx: &AppContext, code: &str) -> Result<()> {
    ctx.repository.set_language(code)?;
    print_settings(ctx);
    Ok(())
}

pub fn print_settings(ctx: &AppContext) {
    let settings = ctx.repository.settings();
    println!(
        "Dark mode: {}\nLanguage: {}",
        if settings.dark_mode { "on" } else { "off" },
        settings.language
    );
}
