use crate::db::PositionGateway;
use crate::dialog::DialogController;
use crate::error::StorageError;
use crate::models::Position;
use crate::store::PositionStore;

/// What closing the window needs right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseRequest {
    ExitNow,
    /// Unsaved changes: ask save / discard / cancel.
    ConfirmUnsaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseChoice {
    Save,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Exit,
    Stay,
}

/// Owns the store and where it is persisted.
pub struct Shell<G: PositionGateway> {
    gateway: G,
    store: PositionStore,
    /// Set when the startup load failed; writing would replace rows we never saw.
    load_failed: bool,
}

impl<G: PositionGateway> Shell<G> {
    /// Load every position. A load failure is handed back next to a shell
    /// with an empty store so the caller can report it and carry on.
    pub fn start(gateway: G) -> (Self, Option<StorageError>) {
        let mut store = PositionStore::new();
        let error = match gateway.load_all() {
            Ok(records) => {
                store.load(records);
                None
            }
            Err(e) => {
                tracing::warn!("Starting with an empty table: {}", e);
                Some(e)
            }
        };
        let load_failed = error.is_some();
        (
            Self {
                gateway,
                store,
                load_failed,
            },
            error,
        )
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PositionStore {
        &mut self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn open_add(&self) -> DialogController {
        DialogController::open_add()
    }

    pub fn open_edit(&self, id: i64) -> Option<DialogController> {
        self.store.get(id).map(DialogController::open_edit)
    }

    pub fn delete(&mut self, id: i64) -> Option<Position> {
        let removed = self.store.remove(id);
        if removed.is_some() {
            tracing::info!("Deleted position #{}", id);
        }
        removed
    }

    /// Persist the whole store. The store stays dirty if the write fails.
    pub fn save(&mut self) -> Result<(), StorageError> {
        if self.load_failed {
            return Err(StorageError::NotLoaded);
        }
        self.gateway.write_all(self.store.positions())?;
        self.store.mark_clean();
        Ok(())
    }

    pub fn request_close(&self) -> CloseRequest {
        if self.store.is_dirty() {
            CloseRequest::ConfirmUnsaved
        } else {
            CloseRequest::ExitNow
        }
    }

    pub fn resolve_close(&mut self, choice: CloseChoice) -> Result<CloseOutcome, StorageError> {
        match choice {
            CloseChoice::Save => {
                self.save()?;
                Ok(CloseOutcome::Exit)
            }
            CloseChoice::Discard => {
                tracing::info!("Discarding unsaved changes");
                Ok(CloseOutcome::Exit)
            }
            CloseChoice::Cancel => Ok(CloseOutcome::Stay),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dialog::Field;

    /// Gateway over a plain vector that counts writes.
    #[derive(Default)]
    pub(crate) struct MemoryGateway {
        pub(crate) rows: Vec<Position>,
        pub(crate) writes: usize,
        pub(crate) fail_load: bool,
        pub(crate) fail_write: bool,
    }

    impl PositionGateway for MemoryGateway {
        fn load_all(&self) -> Result<Vec<Position>, StorageError> {
            if self.fail_load {
                return Err(StorageError::Unavailable(rusqlite::Error::InvalidQuery));
            }
            Ok(self.rows.clone())
        }

        fn write_all(&mut self, records: &[Position]) -> Result<(), StorageError> {
            self.writes += 1;
            if self.fail_write {
                return Err(StorageError::Write(rusqlite::Error::InvalidQuery));
            }
            self.rows = records.to_vec();
            Ok(())
        }
    }

    pub(crate) fn gateway_with(ids: &[i64]) -> MemoryGateway {
        MemoryGateway {
            rows: ids
                .iter()
                .map(|&id| Position {
                    id,
                    company: format!("Company {}", id),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn dirty_shell() -> Shell<MemoryGateway> {
        let (mut shell, _) = Shell::start(gateway_with(&[1, 2]));
        shell.delete(1);
        shell
    }

    #[test]
    fn test_start_loads_store_clean() {
        let (shell, error) = Shell::start(gateway_with(&[2, 1]));
        assert!(error.is_none());
        assert_eq!(shell.store().len(), 2);
        assert!(!shell.store().is_dirty());
        assert_eq!(shell.request_close(), CloseRequest::ExitNow);
    }

    #[test]
    fn test_start_with_unavailable_storage_continues_empty() {
        let gateway = MemoryGateway {
            fail_load: true,
            ..gateway_with(&[1])
        };
        let (shell, error) = Shell::start(gateway);
        assert!(matches!(error, Some(StorageError::Unavailable(_))));
        assert!(shell.store().is_empty());
    }

    #[test]
    fn test_save_after_failed_load_never_writes() {
        let (mut shell, _) = Shell::start(MemoryGateway {
            fail_load: true,
            ..gateway_with(&[1, 2, 3])
        });
        shell.store_mut().add(Position::new(1)).unwrap();

        assert!(matches!(shell.save(), Err(StorageError::NotLoaded)));
        assert!(matches!(
            shell.resolve_close(CloseChoice::Save),
            Err(StorageError::NotLoaded)
        ));
        assert_eq!(shell.gateway().writes, 0);
        assert_eq!(shell.gateway().rows.len(), 3);
        assert!(shell.store().is_dirty());

        assert_eq!(
            shell.resolve_close(CloseChoice::Discard).unwrap(),
            CloseOutcome::Exit
        );
    }

    #[test]
    fn test_close_choosing_no_does_not_write() {
        let mut shell = dirty_shell();
        assert_eq!(shell.request_close(), CloseRequest::ConfirmUnsaved);

        let outcome = shell.resolve_close(CloseChoice::Discard).unwrap();

        assert_eq!(outcome, CloseOutcome::Exit);
        assert_eq!(shell.gateway().writes, 0);
    }

    #[test]
    fn test_close_choosing_yes_writes_exactly_once() {
        let mut shell = dirty_shell();

        let outcome = shell.resolve_close(CloseChoice::Save).unwrap();

        assert_eq!(outcome, CloseOutcome::Exit);
        assert_eq!(shell.gateway().writes, 1);
        assert_eq!(shell.gateway().rows.len(), 1);
        assert!(!shell.store().is_dirty());
    }

    #[test]
    fn test_close_choosing_cancel_stays() {
        let mut shell = dirty_shell();
        assert_eq!(
            shell.resolve_close(CloseChoice::Cancel).unwrap(),
            CloseOutcome::Stay
        );
        assert_eq!(shell.gateway().writes, 0);
        assert!(shell.store().is_dirty());
    }

    #[test]
    fn test_failed_save_keeps_store_for_retry() {
        let (mut shell, _) = Shell::start(MemoryGateway {
            fail_write: true,
            ..gateway_with(&[1, 2])
        });
        shell.delete(2);

        let err = shell.resolve_close(CloseChoice::Save).unwrap_err();

        assert!(matches!(err, StorageError::Write(_)));
        assert!(shell.store().is_dirty());
        assert_eq!(shell.store().len(), 1);
        assert_eq!(shell.gateway().rows.len(), 2);
    }

    #[test]
    fn test_add_dialog_round_trip_through_save() {
        let (mut shell, _) = Shell::start(gateway_with(&[4]));
        let mut dialog = shell.open_add();
        let form = dialog.form_mut();
        form.set(Field::Company, "Acme");
        form.set(Field::JobTitle, "Engineer");
        form.set(Field::JobTitlePdf, "job_descriptions/a.pdf");
        form.set(Field::Location, "Prague");
        form.set(Field::Web, "https://acme.example/jobs/1");

        let saved = dialog.handle_save(shell.store_mut()).unwrap();
        assert_eq!(saved.id, 5);
        assert_eq!(shell.request_close(), CloseRequest::ConfirmUnsaved);

        shell.save().unwrap();
        assert_eq!(shell.gateway().rows.len(), 2);
        assert_eq!(shell.request_close(), CloseRequest::ExitNow);
    }

    #[test]
    fn test_open_edit_unknown_id() {
        let (shell, _) = Shell::start(gateway_with(&[1]));
        assert!(shell.open_edit(1).is_some());
        assert!(shell.open_edit(9).is_none());
    }
}
