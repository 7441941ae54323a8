use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::lead::{Lead, LeadId};
use crate::domain::quote::{Quote, QuoteId};

use super::{RepositoryError, SalesRepository};

#[derive(Debug, Default)]
struct SalesState {
    leads: BTreeMap<LeadId, Lead>,
    quotes: BTreeMap<QuoteId, Quote>,
}

/// Process-local store. Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct InMemorySalesRepository {
    state: Arc<Mutex<SalesState>>,
}

impl InMemorySalesRepository {
    pub fn with_records(leads: Vec<Lead>, quotes: Vec<Quote>) -> Self {
        let repository = Self::default();
        {
            let mut state = repository.lock();
            state.leads.extend(leads.into_iter().map(|lead| (lead.id.clone(), lead)));
            state.quotes.extend(quotes.into_iter().map(|quote| (quote.id.clone(), quote)));
        }
        repository
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.lock().leads.values().cloned().collect()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.lock().quotes.values().cloned().collect()
    }

    pub fn quotes_for_lead(&self, lead_id: &LeadId) -> Vec<Quote> {
        self.lock().quotes.values().filter(|quote| &quote.lead_id == lead_id).cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, SalesState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SalesRepository for InMemorySalesRepository {
    fn find_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.lock().leads.get(id).cloned())
    }

    fn find_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.lock().quotes.get(id).cloned())
    }

    fn find_quote_chain(&self, root_quote_id: &QuoteId) -> Result<Vec<Quote>, RepositoryError> {
        let mut chain = self
            .lock()
            .quotes
            .values()
            .filter(|quote| &quote.root_quote_id == root_quote_id)
            .cloned()
            .collect::<Vec<_>>();
        chain.sort_by_key(|quote| quote.revision_number);
        Ok(chain)
    }

    fn save_lead(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.lock().leads.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn save_quote(&self, quote: Quote) -> Result<(), RepositoryError> {
        self.lock().quotes.insert(quote.id.clone(), quote);
        Ok(())
    }

    fn commit(&self, leads: Vec<Lead>, quotes: Vec<Quote>) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        for lead in leads {
            state.leads.insert(lead.id.clone(), lead);
        }
        for quote in quotes {
            state.quotes.insert(quote.id.clone(), quote);
        }
        Ok(())
    }
}
