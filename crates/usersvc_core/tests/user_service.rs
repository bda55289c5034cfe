use std::cell::{Cell, RefCell};
use std::sync::{Arc, Barrier};
use std::thread;
use usersvc_core::db::{open_db, open_db_in_memory};
use usersvc_core::{
    NewUser, RepoError, RepoResult, SqliteUserRepository, User, UserId, UserRepository,
    UserService, UserServiceError, UserValidationError,
};

/// In-memory store with call counters; `blind_email_lookup` makes
/// `find_by_email` miss so the service check is bypassed.
#[derive(Default)]
struct InMemoryUserRepository {
    users: RefCell<Vec<User>>,
    last_id: Cell<i64>,
    save_calls: Cell<usize>,
    find_by_email_calls: Cell<usize>,
    blind_email_lookup: bool,
}

impl InMemoryUserRepository {
    fn blind() -> Self {
        Self {
            blind_email_lookup: true,
            ..Self::default()
        }
    }
}

impl UserRepository for InMemoryUserRepository {
    fn save(&self, user: &NewUser) -> RepoResult<User> {
        self.save_calls.set(self.save_calls.get() + 1);
        user.validate()?;
        if self.users.borrow().iter().any(|u| u.email == user.email()) {
            return Err(RepoError::ConstraintViolation {
                email: user.email().to_string(),
            });
        }
        self.last_id.set(self.last_id.get() + 1);
        let saved = user.clone().into_user(UserId::new(self.last_id.get()));
        self.users.borrow_mut().push(saved.clone());
        Ok(saved)
    }

    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.users.borrow().iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.find_by_email_calls
            .set(self.find_by_email_calls.get() + 1);
        if self.blind_email_lookup {
            return Ok(None);
        }
        Ok(self.users.borrow().iter().find(|u| u.email == email).cloned())
    }
}

#[test]
fn create_user_checks_email_then_saves() {
    let service = UserService::new(InMemoryUserRepository::default());

    let user = service.create_user("Иван", "ivan@example.com").unwrap();

    assert_eq!(user.name, "Иван");
    assert_eq!(user.email, "ivan@example.com");
    assert_eq!(service.repository().find_by_email_calls.get(), 1);
    assert_eq!(service.repository().save_calls.get(), 1);
}

#[test]
fn create_user_with_existing_email_fails_without_write() {
    let service = UserService::new(InMemoryUserRepository::default());
    service.create_user("Иван", "ivan@example.com").unwrap();

    let err = service.create_user("Иван 2", "ivan@example.com").unwrap_err();

    assert!(matches!(&err, UserServiceError::DuplicateEmail(email) if email == "ivan@example.com"));
    assert_eq!(err.to_string(), "User with this email already exists");
    assert_eq!(err.code(), "duplicate_email");
    assert_eq!(service.repository().save_calls.get(), 1);
    assert_eq!(service.repository().users.borrow().len(), 1);
}

#[test]
fn create_user_rejects_empty_input_before_touching_store() {
    let service = UserService::new(InMemoryUserRepository::default());

    let err = service.create_user("", "ivan@example.com").unwrap_err();

    assert!(matches!(
        err,
        UserServiceError::InvalidInput(UserValidationError::EmptyName)
    ));
    assert_eq!(service.repository().find_by_email_calls.get(), 0);
    assert_eq!(service.repository().save_calls.get(), 0);
}

#[test]
fn create_user_accepts_whitespace_only_name() {
    let service = UserService::new(InMemoryUserRepository::default());

    let ideographic = service.create_user("\u{3000}", "ws@example.com").unwrap();
    let spaced = service.create_user(" ", "ws2@example.com").unwrap();

    assert_eq!(service.get_user_by_id(ideographic.id).unwrap().name, "\u{3000}");
    assert_eq!(service.get_user_by_id(spaced.id).unwrap().name, " ");
}

#[test]
fn get_user_by_id_returns_existing_user() {
    let service = UserService::new(InMemoryUserRepository::default());
    let created = service.create_user("Иван", "ivan@example.com").unwrap();

    let fetched = service.get_user_by_id(created.id).unwrap();
    assert_eq!(fetched, created);
}

#[test]
fn get_user_by_id_for_missing_id_fails_with_not_found() {
    let service = UserService::new(InMemoryUserRepository::default());

    let err = service.get_user_by_id(UserId::new(999)).unwrap_err();

    assert!(matches!(err, UserServiceError::NotFound(id) if id == UserId::new(999)));
    assert_eq!(err.to_string(), "User not found");
}

#[test]
fn storage_constraint_propagates_when_check_is_bypassed() {
    let service = UserService::new(InMemoryUserRepository::blind());
    service.create_user("Петр", "petr@example.com").unwrap();

    let err = service.create_user("Петр2", "petr@example.com").unwrap_err();

    assert!(matches!(
        err,
        UserServiceError::Repo(RepoError::ConstraintViolation { .. })
    ));
    assert_eq!(service.repository().save_calls.get(), 2);
}

/// SQLite store whose email lookup always misses, as seen by a writer that
/// checked before a concurrent insert landed.
struct StaleEmailLookup<'conn>(SqliteUserRepository<'conn>);

impl UserRepository for StaleEmailLookup<'_> {
    fn save(&self, user: &NewUser) -> RepoResult<User> {
        self.0.save(user)
    }

    fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        self.0.find_by_id(id)
    }

    fn find_by_email(&self, _email: &str) -> RepoResult<Option<User>> {
        Ok(None)
    }
}

#[test]
fn sqlite_unique_index_error_propagates_through_service() {
    let conn = open_db_in_memory().unwrap();
    let service = UserService::new(StaleEmailLookup(
        SqliteUserRepository::try_new(&conn).unwrap(),
    ));

    service.create_user("Петр", "petr@example.com").unwrap();
    let err = service.create_user("Петр2", "petr@example.com").unwrap_err();

    assert!(matches!(
        &err,
        UserServiceError::Repo(RepoError::ConstraintViolation { email }) if email == "petr@example.com"
    ));
    assert_eq!(err.code(), "constraint_violation");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn sqlite_create_then_lookup_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteUserRepository::try_new(&conn).unwrap();
    let service = UserService::new(&repo);

    let created = service.create_user("Анна", "anna@example.com").unwrap();
    assert_eq!(created.name, "Анна");
    assert_eq!(created.email, "anna@example.com");

    let by_email = repo.find_by_email("anna@example.com").unwrap().unwrap();
    assert_eq!(by_email, created);

    let by_id = service.get_user_by_id(created.id).unwrap();
    assert_eq!(by_id.name, "Анна");
    assert_eq!(by_id.email, "anna@example.com");
}

#[test]
fn sqlite_duplicate_email_is_rejected_by_service_check() {
    let conn = open_db_in_memory().unwrap();
    let service = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());

    service.create_user("Петр", "petr@example.com").unwrap();
    let err = service.create_user("Петр2", "petr@example.com").unwrap_err();

    assert!(matches!(err, UserServiceError::DuplicateEmail(_)));
}

#[test]
fn sqlite_missing_id_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());

    let err = service.get_user_by_id(UserId::new(999)).unwrap_err();
    assert!(matches!(err, UserServiceError::NotFound(_)));
    assert_eq!(err.to_string(), "User not found");
}

#[test]
fn concurrent_creates_with_same_email_leave_exactly_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = Arc::new(dir.path().join("race.db"));
    drop(open_db(path.as_path()).unwrap());

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    let handles = (0..writers)
        .map(|index| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(path.as_path()).unwrap();
                let service = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
                barrier.wait();
                service
                    .create_user(format!("writer {index}"), "race@example.com")
                    .map(|user| user.id)
                    .map_err(|err| err.code())
            })
        })
        .collect::<Vec<_>>();

    let outcomes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    for outcome in outcomes.iter().filter_map(|outcome| outcome.as_ref().err()) {
        assert!(
            *outcome == "duplicate_email" || *outcome == "constraint_violation",
            "unexpected failure code: {outcome}"
        );
    }

    let conn = open_db(path.as_path()).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
