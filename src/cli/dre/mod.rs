pub mod text;
pub mod view;

use std::io::IsTerminal;
use std::path::PathBuf;

use chrono::Datelike;

use crate::api::ApiClient;
use crate::error::{PainelError, Result};
use crate::models::{parse_dre_document, AccountRow, DreQuery, Modelo, MonthSelection};
use crate::settings::{load_session, load_settings};

use super::DreArgs;

/// Where DRE rows come from: the backend, or a saved JSON document.
#[derive(Debug, Clone)]
pub enum Source {
    Api {
        client: ApiClient,
        organization_id: i64,
    },
    File(PathBuf),
}

impl Source {
    pub fn from_args(args: &DreArgs) -> Result<Self> {
        if let Some(path) = &args.input {
            return Ok(Source::File(PathBuf::from(path)));
        }
        let session = load_session();
        let organization_id = session.organization_id.ok_or(PainelError::NoOrganization)?;
        let settings = load_settings();
        let client = ApiClient::new(&settings.api_url, &session)?;
        Ok(Source::Api {
            client,
            organization_id,
        })
    }

    /// A file holds one fixed dataset; changing year or modelo cannot reload it.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Source::File(_))
    }

    pub fn load(&self, modelo: Modelo, year: i32) -> Result<Vec<AccountRow>> {
        match self {
            Source::Api {
                client,
                organization_id,
            } => client.fetch_dre(&DreQuery::realizado(*organization_id, modelo, year)),
            Source::File(path) => {
                let json = std::fs::read_to_string(path)?;
                parse_dre_document(&json)
            }
        }
    }
}

/// Parameters of one DRE run, resolved from the command line.
#[derive(Debug, Clone)]
pub struct DreParams {
    pub year: i32,
    pub modelo: Modelo,
    pub selection: MonthSelection,
    pub compact: bool,
}

impl DreParams {
    pub fn from_args(args: &DreArgs, today: chrono::NaiveDate) -> Result<Self> {
        let year = args.year.unwrap_or(today.year());
        let selection = match &args.months {
            Some(s) => MonthSelection::parse(s)?,
            None => MonthSelection::default_for(year, today),
        };
        Ok(Self {
            year,
            modelo: args.modelo,
            selection,
            compact: args.compact,
        })
    }
}

pub fn dispatch(args: DreArgs) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let params = DreParams::from_args(&args, today)?;
    let source = Source::from_args(&args)?;

    if !args.text && std::io::stdout().is_terminal() {
        view::run(source, params)
    } else {
        let rows = load_or_empty(&source, params.modelo, params.year);
        println!("{}", text::report(&rows, &params, args.expand_all));
        Ok(())
    }
}

/// Fetch failures leave the dataset empty; the report still renders.
pub(crate) fn load_or_empty(source: &Source, modelo: Modelo, year: i32) -> Vec<AccountRow> {
    match source.load(modelo, year) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, year, modelo = %modelo, "failed to load DRE");
            Vec::new()
        }
    }
}
