use thiserror::Error;

use crate::model::{CatalogError, ProgressError, RatingError};
use crate::scheduler::SchedulerError;

/// Any error raised by the core crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProgressStore, QuestionBank, Rating};

    fn load(bank: &str, progress: &str, rating: u8) -> Result<(usize, Rating), Error> {
        let bank = QuestionBank::from_json_str(bank)?;
        let loaded = ProgressStore::from_json_str(progress)?;
        let rating = Rating::from_u8(rating)?;
        Ok((bank.modules().len() + loaded.store.history.len(), rating))
    }

    #[test]
    fn lower_errors_convert_with_question_mark() {
        assert!(load(r#"{"M": {}}"#, "[]", 3).is_ok());
        assert!(matches!(load("[]", "[]", 3), Err(Error::Catalog(_))));
        assert!(matches!(load("{}", "42", 3), Err(Error::Progress(_))));
        assert!(matches!(load("{}", "[]", 5), Err(Error::Rating(_))));
    }
}
