//! Loan management service

use chrono::NaiveDate;

use super::notifications::{LoanNotification, NotificationDispatcher};
use crate::{
    error::{AppError, AppResult},
    models::loan::{CreateLoan, Loan, LoanDetails, NewLoan},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    notifications: NotificationDispatcher,
}

impl LoansService {
    pub fn new(repository: Repository, notifications: NotificationDispatcher) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Active loans
    pub async fn list(&self) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.find_all().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Loan> {
        self.repository.loans.find_by_id(id).await
    }

    /// Lend a book to `user_id` and notify them
    pub async fn create_loan(&self, user_id: i32, request: CreateLoan) -> AppResult<Loan> {
        if request.due_date < request.loan_date {
            return Err(AppError::Validation(
                "The due date must be a date after or equal to loan date".to_string(),
            ));
        }

        let book = self.repository.books.find_by_id(request.book_id).await?;
        let borrower = self.repository.users.find_by_id(user_id).await?;

        if self.repository.loans.is_book_loaned(book.id).await? {
            tracing::info!(book_id = book.id, user_id, "Rejected loan of a book already out");
            return Err(AppError::BookAlreadyLoaned { book_id: book.id });
        }

        let loan = self
            .repository
            .loans
            .persist(&NewLoan {
                user_id,
                book_id: book.id,
                loan_date: request.loan_date,
                due_date: request.due_date,
            })
            .await?;
        tracing::info!(loan_id = loan.id, book_id = book.id, user_id, "Loan created");

        self.notifications.dispatch(LoanNotification {
            recipient_name: borrower.name,
            recipient_email: borrower.email,
            book_title: book.title,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
        });

        Ok(loan)
    }

    /// Record the return of a loaned book
    pub async fn return_loan(&self, id: i32, return_date: NaiveDate) -> AppResult<Loan> {
        let loan = self.repository.loans.update(id, return_date).await?;
        tracing::info!(loan_id = id, book_id = loan.book_id, "Loan returned");
        Ok(loan)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.loans.delete(id).await
    }

    pub async fn is_book_loaned(&self, book_id: i32) -> AppResult<bool> {
        self.repository.loans.is_book_loaned(book_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::Cache,
        models::{book::BookRequest, user::UserData},
        repository::CachePolicy,
        services::notifications::{LogNotifier, MockNotifier, Notifier},
        store::{MemoryStore, Store},
    };
    use async_trait::async_trait;
    use std::{sync::Arc, time::Duration};
    use tokio::sync::mpsc;

    struct ChannelNotifier(mpsc::UnboundedSender<LoanNotification>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn loan_created(&self, notification: &LoanNotification) -> AppResult<()> {
            self.0
                .send(notification.clone())
                .map_err(|e| AppError::Internal(e.to_string()))
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Store with one user and one book, both with id returned
    async fn seeded() -> (Arc<MemoryStore>, i32, i32) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .users_insert(&UserData {
                name: "User 1".to_string(),
                email: "u1@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let book = store
            .books_insert(&BookRequest {
                title: "The Book".to_string(),
                publication_year: 2020,
                authors: Vec::new(),
            })
            .await
            .unwrap();
        (store, user.id, book.id)
    }

    fn service(store: Arc<MemoryStore>, notifier: Arc<dyn Notifier>) -> LoansService {
        let repository = Repository::new(store, Cache::memory(), CachePolicy::default());
        LoansService::new(repository, NotificationDispatcher::new(notifier))
    }

    fn request(book_id: i32) -> CreateLoan {
        CreateLoan {
            book_id,
            loan_date: date("2022-01-01"),
            due_date: date("2022-01-02"),
        }
    }

    #[tokio::test]
    async fn test_create_loan_notifies_borrower() {
        let (store, user_id, book_id) = seeded().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let loans = service(store, Arc::new(ChannelNotifier(tx)));

        let loan = loans.create_loan(user_id, request(book_id)).await.unwrap();
        assert_eq!(loan.user_id, user_id);
        assert!(loan.is_active());

        let sent = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.recipient_email, "u1@example.com");
        assert_eq!(sent.book_title, "The Book");
        assert_eq!(sent.loan_date, date("2022-01-01"));
    }

    #[tokio::test]
    async fn test_loaned_book_rejected_without_write() {
        let (store, user_id, book_id) = seeded().await;
        let loans = service(store.clone(), Arc::new(LogNotifier));

        let first = loans.create_loan(user_id, request(book_id)).await.unwrap();
        // Warm the listing so the check is answered from cache
        loans.list().await.unwrap();

        let second = loans.create_loan(user_id, request(book_id)).await;
        assert!(matches!(second, Err(AppError::BookAlreadyLoaned { .. })));
        assert_eq!(store.loans_count().await, 1);
        assert!(loans.get(first.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_loan() {
        let (store, user_id, book_id) = seeded().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mock = MockNotifier::new();
        mock.expect_loan_created().times(1).returning(move |_| {
            let _ = tx.send(());
            Err(AppError::Internal("smtp down".to_string()))
        });
        let loans = service(store, Arc::new(mock));

        assert!(loans.create_loan(user_id, request(book_id)).await.is_ok());
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(loans.is_book_loaned(book_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_return_then_not_loaned() {
        let (store, user_id, book_id) = seeded().await;
        let loans = service(store, Arc::new(LogNotifier));

        let loan = loans.create_loan(user_id, request(book_id)).await.unwrap();
        let returned = loans.return_loan(loan.id, date("2022-01-03")).await.unwrap();
        assert_eq!(returned.return_date, Some(date("2022-01-03")));
        assert!(!loans.is_book_loaned(book_id).await.unwrap());

        assert!(loans.create_loan(user_id, request(book_id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (store, user_id, book_id) = seeded().await;
        let mut mock = MockNotifier::new();
        mock.expect_loan_created().never();
        let loans = service(store.clone(), Arc::new(mock));

        let backwards = CreateLoan {
            book_id,
            loan_date: date("2022-01-02"),
            due_date: date("2022-01-01"),
        };
        assert!(matches!(
            loans.create_loan(user_id, backwards).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            loans.create_loan(user_id, request(404)).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.loans_count().await, 0);
    }
}
