//! Single-page fetch of a user's starred repositories.
//!
//! Builds the GraphQL variables, issues exactly one request through the
//! transport, and normalizes the response into a [`Page`].

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::{FetchError, FetchResult};
use crate::metrics::{FetchTimer, record_remote_fetch, record_remote_fetch_error};
use crate::models::StarredRepoEdge;
use crate::ports::{Cursor, GraphQLTransport, Page, StarOrder};

/// Hard per-page ceiling of the remote API.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query template for one page of starred repositories.
pub const STARRED_REPOS_QUERY: &str = r#"
query StarredRepos($login: String!, $perpage: Int!, $startcursor: String, $orderBy: StarOrder) {
  user(login: $login) {
    login
    starredRepositories(first: $perpage, after: $startcursor, orderBy: $orderBy) {
      edges {
        starredAt
        node {
          name
          url
          description
          createdAt
          pushedAt
          updatedAt
          stargazerCount
          nameWithOwner
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

/// Parameters of one page request.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions<'a> {
    /// Login of the user whose stars are listed. Must be non-empty.
    pub login: &'a str,
    /// Page size, `1..=MAX_PAGE_SIZE`.
    pub per_page: u32,
    /// Resume after this cursor; `None` for the first page.
    pub start_cursor: Option<&'a Cursor>,
    /// Remote ordering; `None` keeps the API default.
    pub order: Option<StarOrder>,
}

#[derive(Serialize)]
struct StarredReposVariables<'a> {
    login: &'a str,
    perpage: u32,
    startcursor: Option<&'a str>,
    #[serde(rename = "orderBy")]
    order_by: Option<StarOrder>,
}

#[derive(Deserialize)]
struct StarredReposData {
    user: Option<UserNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    starred_repositories: StarredRepositoriesConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StarredRepositoriesConnection {
    #[serde(default)]
    edges: Vec<StarredRepoEdge>,
    page_info: PageInfoNode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfoNode {
    end_cursor: Option<String>,
    has_next_page: bool,
}

/// Validate request parameters before anything is sent.
fn validate(options: &FetchOptions<'_>) -> FetchResult<()> {
    if options.login.is_empty() {
        return Err(FetchError::InvalidRequest("login cannot be empty".into()));
    }
    if options.per_page == 0 || options.per_page > MAX_PAGE_SIZE {
        return Err(FetchError::InvalidRequest(format!(
            "page size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, options.per_page
        )));
    }
    Ok(())
}

/// Fetch one page of starred repositories.
///
/// Transport failures are returned unchanged. Nothing is retried.
#[instrument(skip_all, fields(login = %options.login, per_page = options.per_page, after = options.start_cursor.is_some()))]
pub async fn fetch_starred_repos<T>(
    transport: &T,
    options: FetchOptions<'_>,
) -> FetchResult<Page<StarredRepoEdge>>
where
    T: GraphQLTransport + ?Sized,
{
    validate(&options)?;

    let variables = serde_json::to_value(StarredReposVariables {
        login: options.login,
        perpage: options.per_page,
        startcursor: options.start_cursor.map(|c| c.value.as_str()),
        order_by: options.order,
    })
    .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

    debug!(order = ?options.order, "Fetching starred repositories page");
    record_remote_fetch();

    let data = {
        let _timer = FetchTimer::new();
        transport.execute(STARRED_REPOS_QUERY, variables).await
    };
    let data = data.inspect_err(|e| record_remote_fetch_error(e.kind()))?;

    let page = decode_page(options.login, data).inspect_err(|e| record_remote_fetch_error(e.kind()))?;

    trace!(
        edges = page.edges.len(),
        has_next_page = page.has_next_page,
        "Page received"
    );
    Ok(page)
}

/// Normalize a `data` object into a page.
fn decode_page(login: &str, data: serde_json::Value) -> FetchResult<Page<StarredRepoEdge>> {
    let data: StarredReposData =
        serde_json::from_value(data).map_err(|e| FetchError::Decode(e.to_string()))?;

    let user = data
        .user
        .ok_or_else(|| FetchError::UserNotFound(login.to_string()))?;
    let connection = user.starred_repositories;
    let end_cursor = connection
        .page_info
        .end_cursor
        .filter(|c| !c.is_empty())
        .map(Cursor::new);

    // Rows were served but there is no position to resume after them.
    if connection.page_info.has_next_page && end_cursor.is_none() && !connection.edges.is_empty() {
        return Err(FetchError::Decode("hasNextPage without endCursor".into()));
    }

    Ok(Page {
        edges: connection.edges,
        has_next_page: connection.page_info.has_next_page,
        end_cursor,
    })
}
