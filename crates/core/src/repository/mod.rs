use thiserror::Error;

use crate::domain::lead::{Lead, LeadId};
use crate::domain::quote::{Quote, QuoteId};

pub mod memory;

pub use memory::InMemorySalesRepository;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Lead and quote storage consumed by the revision manager.
pub trait SalesRepository: Send + Sync {
    fn find_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Every quote whose original ancestor is `root_quote_id`, ordered by revision.
    fn find_quote_chain(&self, root_quote_id: &QuoteId) -> Result<Vec<Quote>, RepositoryError>;
    fn save_lead(&self, lead: Lead) -> Result<(), RepositoryError>;
    fn save_quote(&self, quote: Quote) -> Result<(), RepositoryError>;

    /// Stores the records touched by one domain operation. Implementations that
    /// can write atomically should override this.
    fn commit(&self, leads: Vec<Lead>, quotes: Vec<Quote>) -> Result<(), RepositoryError> {
        for lead in leads {
            self.save_lead(lead)?;
        }
        for quote in quotes {
            self.save_quote(quote)?;
        }
        Ok(())
    }
}

impl<R> SalesRepository for &R
where
    R: SalesRepository,
{
    fn find_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        (**self).find_lead(id)
    }

    fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        (**self).find_quote(id)
    }

    fn find_quote_chain(&self, root_quote_id: &QuoteId) -> Result<Vec<Quote>, RepositoryError> {
        (**self).find_quote_chain(root_quote_id)
    }

    fn save_lead(&self, lead: Lead) -> Result<(), RepositoryError> {
        (**self).save_lead(lead)
    }

    fn save_quote(&self, quote: Quote) -> Result<(), RepositoryError> {
        (**self).save_quote(quote)
    }

    fn commit(&self, leads: Vec<Lead>, quotes: Vec<Quote>) -> Result<(), RepositoryError> {
        (**self).commit(leads, quotes)
    }
}
