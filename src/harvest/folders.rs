use crate::error::HarvestError;
use crate::harvest::store::RemoteStore;

/// Walk `segments` under `root_id`, reusing existing folders and creating
/// missing ones, and return the id of the deepest folder.
///
/// Each level is searched before anything is created, so resolving the same
/// chain again lands on the same folders. When a level already holds
/// duplicates the first one returned by the store wins and a warning is
/// logged.
pub fn resolve_folder_chain<S, T>(
    store: &mut S,
    root_id: &str,
    segments: &[T],
) -> Result<String, HarvestError>
where
    S: RemoteStore + ?Sized,
    T: AsRef<str>,
{
    if let Some(pos) = segments.iter().position(|s| s.as_ref().trim().is_empty()) {
        return Err(HarvestError::RemoteStore(format!(
            "folder path segment {pos} is empty"
        )));
    }

    let mut parent = root_id.to_string();
    for segment in segments {
        let name = segment.as_ref();
        let matches = store.find_folders(name, &parent)?;
        parent = match matches.split_first() {
            Some((first, rest)) => {
                if !rest.is_empty() {
                    tracing::warn!(
                        folder = name,
                        parent = %parent,
                        chosen = %first,
                        duplicates = matches.len(),
                        "duplicate remote folders; using the first match"
                    );
                }
                tracing::debug!(folder = name, id = %first, "reusing remote folder");
                first.clone()
            }
            None => {
                let id = store.create_folder(name, &parent)?;
                tracing::info!(folder = name, parent = %parent, id = %id, "created remote folder");
                id
            }
        };
    }
    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::store::memory::MemoryStore;

    const CHAIN: [&str; 4] = ["2024", "3.Marzo", "Formulario 1", "ASOAIRES"];

    #[test]
    fn resolving_twice_is_idempotent() {
        let mut store = MemoryStore::default();

        let first = resolve_folder_chain(&mut store, "root", &CHAIN).unwrap();
        let creates_after_first = store.creates;
        let second = resolve_folder_chain(&mut store, "root", &CHAIN).unwrap();

        assert_eq!(first, second);
        assert_eq!(creates_after_first, 4);
        assert_eq!(store.creates, 4);
        assert_eq!(store.children_named("2024", "root"), 1);
    }

    #[test]
    fn existing_prefix_is_reused() {
        let mut store = MemoryStore::default().with_folder("2024", "root");

        resolve_folder_chain(&mut store, "root", &CHAIN).unwrap();

        assert_eq!(store.children_named("2024", "root"), 1);
        assert_eq!(store.creates, 3);
    }

    #[test]
    fn duplicates_pick_first_and_do_not_fail() {
        let mut store = MemoryStore::default()
            .with_folder("2024", "root")
            .with_folder("2024", "root");
        let oldest = store.folders[0].id.clone();

        let leaf = resolve_folder_chain(&mut store, "root", &["2024"]).unwrap();

        assert_eq!(leaf, oldest);
        assert_eq!(store.creates, 0);
    }

    #[test]
    fn same_name_under_different_parents_is_distinct() {
        let mut store = MemoryStore::default();
        let a = resolve_folder_chain(&mut store, "root", &["2024", "1.Enero", "F", "X"]).unwrap();
        let b = resolve_folder_chain(&mut store, "root", &["2024", "2.Febrero", "F", "X"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_chain_resolves_to_root() {
        let mut store = MemoryStore::default();
        let empty: [&str; 0] = [];
        assert_eq!(resolve_folder_chain(&mut store, "root", &empty).unwrap(), "root");
    }

    #[test]
    fn store_errors_propagate() {
        let mut store = MemoryStore::default();
        store.fail_queries = true;
        let err = resolve_folder_chain(&mut store, "root", &CHAIN).unwrap_err();
        assert!(matches!(err, HarvestError::RemoteStore(_)));
        assert_eq!(store.creates, 0);
    }

    #[test]
    fn blank_segment_is_rejected_before_any_call() {
        let mut store = MemoryStore::default();
        let err = resolve_folder_chain(&mut store, "root", &["2024", " "]).unwrap_err();
        assert!(matches!(err, HarvestError::RemoteStore(_)));
        assert!(store.folders.is_empty());
    }
}
