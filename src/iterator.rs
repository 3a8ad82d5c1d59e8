//! Lazy iteration over cursor-paginated collections.

use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

use crate::client::{PageRequest, PageSource};
use crate::error::Error;
use crate::object::Object;

/// Largest page the API serves in one request.
pub const MAX_PAGE_SIZE: usize = 40;

/// Iteration settings, fixed when the iterator is built.
#[derive(Debug, Clone)]
pub struct IteratorOptions {
  /// Maximum number of items to yield. `0` means no limit: iteration runs
  /// until the collection is exhausted.
  pub limit: usize,
  /// Position to start from, as returned by a previous iterator.
  pub cursor: String,
  /// Server-side filter expression.
  pub filter: String,
  /// Items requested per page, capped at [`MAX_PAGE_SIZE`].
  pub page_size: usize,
}

impl Default for IteratorOptions {
  fn default() -> Self {
    Self {
      limit: 0,
      cursor: String::new(),
      filter: String::new(),
      page_size: MAX_PAGE_SIZE,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Created,
  Fetching,
  HasPage,
  LimitReached,
  Exhausted,
  Errored,
}

/// Walks a collection one page at a time, in server order.
///
/// Each page request asks for no more items than the remaining limit, so the
/// cursor returned with the last page resumes exactly after the last item
/// yielded.
pub struct CollectionIterator<S: ?Sized> {
  source: Arc<S>,
  collection: Url,
  options: IteratorOptions,
  state: State,
  page: Vec<Object>,
  pos: usize,
  count: usize,
  cursor: String,
  error: Option<Error>,
}

impl<S: PageSource + ?Sized> CollectionIterator<S> {
  pub fn new(source: Arc<S>, collection: Url, options: IteratorOptions) -> Self {
    let cursor = options.cursor.clone();
    Self {
      source,
      collection,
      options,
      state: State::Created,
      page: Vec::new(),
      pos: 0,
      count: 0,
      cursor,
      error: None,
    }
  }

  fn remaining(&self) -> Option<usize> {
    (self.options.limit > 0).then(|| self.options.limit - self.count)
  }

  /// Advances to the next item, fetching a new page when the current one is
  /// used up. Returns `false` once the collection or the limit is exhausted,
  /// or a page request fails.
  pub async fn next(&mut self) -> bool {
    match self.state {
      State::LimitReached | State::Exhausted | State::Errored => return false,
      State::Created | State::Fetching | State::HasPage => {}
    }
    if self.remaining() == Some(0) {
      self.state = State::LimitReached;
      return false;
    }
    if self.state == State::HasPage && self.pos + 1 < self.page.len() {
      self.pos += 1;
      self.count += 1;
      return true;
    }

    loop {
      if self.state != State::Created && self.cursor.is_empty() {
        self.state = State::Exhausted;
        self.page.clear();
        return false;
      }

      self.state = State::Fetching;
      let limit = self
        .remaining()
        .unwrap_or(usize::MAX)
        .min(self.options.page_size.clamp(1, MAX_PAGE_SIZE));
      debug!(
        collection = %self.collection,
        cursor = %self.cursor,
        limit,
        "fetching page"
      );

      let req = PageRequest {
        collection: &self.collection,
        cursor: &self.cursor,
        limit,
        filter: &self.options.filter,
      };
      match self.source.get_page(req).await {
        Ok(page) => {
          let mut objects = page.objects;
          objects.truncate(limit);
          if objects.is_empty() && page.cursor == self.cursor {
            debug!(cursor = %self.cursor, "empty page did not advance");
            self.state = State::Exhausted;
            self.page.clear();
            return false;
          }
          self.page = objects;
          self.cursor = page.cursor;
          self.pos = 0;
          self.state = State::HasPage;
          if !self.page.is_empty() {
            self.count += 1;
            return true;
          }
        }
        Err(e) => {
          debug!(error = %e, "page fetch failed");
          self.error = Some(e);
          self.state = State::Errored;
          self.page.clear();
          return false;
        }
      }
    }
  }

  /// The current item, if the last call to [`next`](Self::next) returned
  /// `true`.
  #[must_use]
  pub fn get(&self) -> Option<&Object> {
    match self.state {
      State::HasPage => self.page.get(self.pos),
      _ => None,
    }
  }

  /// The first error hit while fetching pages, if any.
  #[must_use]
  pub const fn error(&self) -> Option<&Error> {
    self.error.as_ref()
  }

  /// Consumes the iterator, returning its error if one occurred.
  #[must_use]
  pub fn into_error(self) -> Option<Error> {
    self.error
  }

  /// Token that resumes iteration after the current position. Empty once
  /// the collection is exhausted.
  #[must_use]
  pub fn cursor(&self) -> &str {
    match self.state {
      State::Exhausted => "",
      _ => &self.cursor,
    }
  }

  /// Number of items yielded so far.
  #[must_use]
  pub const fn count(&self) -> usize {
    self.count
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::client::Page;
  use crate::error::Result;
  use async_trait::async_trait;
  use std::sync::Mutex;

  /// A collection of `total` files served in pages of at most `max_page`.
  pub struct FakePages {
    pub total: usize,
    pub max_page: usize,
    pub ignore_limit: bool,
    pub fail_at: Option<String>,
    pub requests: Mutex<Vec<(String, usize, String)>>,
  }

  impl FakePages {
    pub fn new(total: usize, max_page: usize) -> Self {
      Self {
        total,
        max_page,
        ignore_limit: false,
        fail_at: None,
        requests: Mutex::new(Vec::new()),
      }
    }
  }

  #[async_trait]
  impl PageSource for FakePages {
    async fn get_page(&self, req: PageRequest<'_>) -> Result<Page> {
      self.requests.lock().unwrap().push((
        req.cursor.to_string(),
        req.limit,
        req.filter.to_string(),
      ));
      if self.fail_at.as_deref() == Some(req.cursor) {
        return Err(Error::Api {
          code: "QuotaExceededError".into(),
          message: "quota exceeded".into(),
        });
      }
      let start: usize = if req.cursor.is_empty() {
        0
      } else {
        req.cursor.parse().unwrap()
      };
      let size = if self.ignore_limit {
        self.max_page
      } else {
        self.max_page.min(req.limit)
      };
      let end = (start + size).min(self.total);
      let objects = (start..end)
        .map(|i| Object::new("file", format!("f{i}")))
        .collect();
      let cursor = if end < self.total {
        end.to_string()
      } else {
        String::new()
      };
      Ok(Page { objects, cursor })
    }
  }

  /// Always answers with an empty page pointing at the same cursor.
  struct StuckPages {
    calls: Mutex<usize>,
  }

  #[async_trait]
  impl PageSource for StuckPages {
    async fn get_page(&self, _req: PageRequest<'_>) -> Result<Page> {
      *self.calls.lock().unwrap() += 1;
      Ok(Page {
        objects: Vec::new(),
        cursor: "stuck".into(),
      })
    }
  }

  fn url() -> Url {
    Url::parse("https://example.test/api/v3/intelligence/search?query=x")
      .unwrap()
  }

  fn options(limit: usize, cursor: &str) -> IteratorOptions {
    IteratorOptions {
      limit,
      cursor: cursor.to_string(),
      ..Default::default()
    }
  }

  async fn collect<S: PageSource + ?Sized>(
    it: &mut CollectionIterator<S>,
  ) -> Vec<String> {
    let mut ids = Vec::new();
    while it.next().await {
      ids.push(it.get().unwrap().id.clone());
    }
    ids
  }

  #[tokio::test]
  async fn limit_caps_items_across_pages() {
    let src = Arc::new(FakePages::new(12, 2));
    let mut it = CollectionIterator::new(src, url(), options(5, ""));
    let ids = collect(&mut it).await;
    assert_eq!(ids, ["f0", "f1", "f2", "f3", "f4"]);
    assert_eq!(it.count(), 5);
    assert!(!it.cursor().is_empty());
    assert!(it.error().is_none());
    assert!(!it.next().await);
  }

  #[tokio::test]
  async fn zero_limit_means_unbounded() {
    let src = Arc::new(FakePages::new(12, 5));
    let mut it = CollectionIterator::new(src, url(), options(0, ""));
    let ids = collect(&mut it).await;
    assert_eq!(ids.len(), 12);
    assert_eq!(ids.last().unwrap(), "f11");
    assert_eq!(it.cursor(), "");
  }

  #[tokio::test]
  async fn limit_above_collection_size_stops_at_end() {
    let src = Arc::new(FakePages::new(3, 40));
    let mut it = CollectionIterator::new(src, url(), options(10, ""));
    assert_eq!(collect(&mut it).await, ["f0", "f1", "f2"]);
    assert_eq!(it.cursor(), "");
  }

  #[tokio::test]
  async fn cursor_resumes_after_last_item() {
    let src = Arc::new(FakePages::new(12, 40));
    let mut first =
      CollectionIterator::new(Arc::clone(&src), url(), options(5, ""));
    collect(&mut first).await;
    let cursor = first.cursor().to_string();

    let mut second = CollectionIterator::new(src, url(), options(5, &cursor));
    assert_eq!(
      collect(&mut second).await,
      ["f5", "f6", "f7", "f8", "f9"]
    );
  }

  #[tokio::test]
  async fn page_requests_never_exceed_remaining_limit() {
    let src = Arc::new(FakePages::new(100, 40));
    let mut it = CollectionIterator::new(
      Arc::clone(&src),
      url(),
      IteratorOptions {
        limit: 50,
        filter: "positives:5+".into(),
        ..Default::default()
      },
    );
    assert_eq!(collect(&mut it).await.len(), 50);
    let requests = src.requests.lock().unwrap();
    let limits: Vec<_> = requests.iter().map(|r| r.1).collect();
    assert_eq!(limits, [40, 10]);
    assert!(requests.iter().all(|r| r.2 == "positives:5+"));
  }

  #[tokio::test]
  async fn oversized_pages_are_truncated_to_limit() {
    let mut pages = FakePages::new(12, 10);
    pages.ignore_limit = true;
    let mut it = CollectionIterator::new(Arc::new(pages), url(), options(3, ""));
    assert_eq!(collect(&mut it).await, ["f0", "f1", "f2"]);
  }

  #[tokio::test]
  async fn error_stops_iteration_and_keeps_cursor() {
    let mut pages = FakePages::new(12, 4);
    pages.fail_at = Some("4".into());
    let mut it = CollectionIterator::new(Arc::new(pages), url(), options(0, ""));
    assert_eq!(collect(&mut it).await, ["f0", "f1", "f2", "f3"]);
    assert!(it.error().is_some());
    assert_eq!(it.cursor(), "4");
    assert!(!it.next().await);
    assert!(it.get().is_none());
    assert!(it.into_error().is_some());
  }

  #[tokio::test]
  async fn get_before_next_is_none() {
    let src = Arc::new(FakePages::new(1, 1));
    let mut it = CollectionIterator::new(src, url(), options(0, ""));
    assert!(it.get().is_none());
    assert!(it.next().await);
    assert_eq!(it.get().unwrap().id, "f0");
    assert!(!it.next().await);
    assert!(it.get().is_none());
  }

  #[tokio::test]
  async fn empty_collection_yields_nothing() {
    let src = Arc::new(FakePages::new(0, 10));
    let mut it = CollectionIterator::new(src, url(), options(0, ""));
    assert!(!it.next().await);
    assert_eq!(it.cursor(), "");
    assert!(it.error().is_none());
  }

  #[tokio::test]
  async fn empty_page_with_same_cursor_ends_iteration() {
    let src = Arc::new(StuckPages {
      calls: Mutex::new(0),
    });
    let mut it =
      CollectionIterator::new(Arc::clone(&src), url(), options(0, ""));
    assert!(!it.next().await);
    assert_eq!(*src.calls.lock().unwrap(), 2);
    assert_eq!(it.cursor(), "");
    assert!(it.error().is_none());

    let mut it = CollectionIterator::new(src, url(), options(0, "stuck"));
    assert!(!it.next().await);
    assert!(it.get().is_none());
  }
}
