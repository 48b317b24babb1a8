use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{PainelError, Result};
use crate::settings::{
    clear_session, load_session, load_settings, save_session, save_settings,
    AssessorOrganization, Profile, Session,
};

use super::SessionCommands;

pub fn dispatch(cmd: SessionCommands) -> Result<()> {
    match cmd {
        SessionCommands::Show => show(),
        SessionCommands::Set {
            token,
            org,
            org_name,
            user,
            profile,
            assessor_orgs,
            api_url,
        } => set(SessionUpdate {
            token,
            org,
            org_name,
            user,
            profile,
            assessor_orgs,
            api_url,
        }),
        SessionCommands::UseOrg { id } => use_org(id),
        SessionCommands::Clear => {
            clear_session()?;
            println!("Session cleared.");
            Ok(())
        }
    }
}

pub fn show() -> Result<()> {
    let session = load_session();
    let settings = load_settings();
    println!("{}", format_session(&session, &settings.api_url));
    Ok(())
}

pub fn format_session(session: &Session, api_url: &str) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    let profile = match session.profile {
        Profile::User => "user",
        Profile::Assessor => "assessor",
    };
    let org = match (session.organization_id, session.organization_name.as_deref()) {
        (Some(id), Some(name)) => format!("{id} ({name})"),
        (Some(id), None) => id.to_string(),
        (None, _) => "(none)".to_string(),
    };
    table.add_row(vec![Cell::new("API"), Cell::new(api_url)]);
    table.add_row(vec![Cell::new("Profile"), Cell::new(profile)]);
    table.add_row(vec![
        Cell::new("User"),
        Cell::new(session.user_name.as_deref().unwrap_or("(none)")),
    ]);
    table.add_row(vec![Cell::new("Token"), Cell::new(session.masked_token())]);
    table.add_row(vec![Cell::new("Organization"), Cell::new(org)]);
    let mut out = format!("Session\n{table}");

    if !session.assessor_organizations.is_empty() {
        let mut orgs = Table::new();
        orgs.set_header(vec!["Id", "Organization", ""]);
        for o in &session.assessor_organizations {
            let marker = if session.organization_id == Some(o.id) {
                "active".green().to_string()
            } else {
                String::new()
            };
            orgs.add_row(vec![Cell::new(o.id), Cell::new(&o.name), Cell::new(marker)]);
        }
        out.push_str(&format!("\n\nAssessor organizations\n{orgs}"));
    }
    out
}

pub struct SessionUpdate {
    pub token: Option<String>,
    pub org: Option<i64>,
    pub org_name: Option<String>,
    pub user: Option<String>,
    pub profile: Option<Profile>,
    pub assessor_orgs: Vec<String>,
    pub api_url: Option<String>,
}

fn set(mut update: SessionUpdate) -> Result<()> {
    let mut session = load_session();
    let token = match update.token.take() {
        Some(t) => t,
        None if session.is_authenticated() => session.token.clone().unwrap_or_default(),
        None => rpassword::prompt_password("Token: ")?,
    };
    apply_update(&mut session, token, &update)?;
    save_session(&session)?;

    if let Some(url) = update.api_url {
        let mut settings = load_settings();
        settings.api_url = url;
        save_settings(&settings)?;
    }
    println!("Session saved.");
    Ok(())
}

fn apply_update(session: &mut Session, token: String, update: &SessionUpdate) -> Result<()> {
    if token.trim().is_empty() {
        return Err(PainelError::NotAuthenticated);
    }
    session.token = Some(token.trim().to_string());
    if let Some(p) = update.profile {
        session.profile = p;
    }
    if let Some(u) = &update.user {
        session.user_name = Some(u.clone());
    }
    if !update.assessor_orgs.is_empty() {
        session.assessor_organizations = update
            .assessor_orgs
            .iter()
            .map(|s| AssessorOrganization::parse(s))
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(id) = update.org {
        session.use_organization(id)?;
    }
    if let Some(name) = &update.org_name {
        session.organization_name = Some(name.clone());
    }
    Ok(())
}

fn use_org(id: i64) -> Result<()> {
    let mut session = load_session();
    if !session.is_authenticated() {
        return Err(PainelError::NotAuthenticated);
    }
    session.use_organization(id)?;
    save_session(&session)?;
    println!("Active organization: {id}");
    Ok(())
}
