use super::{IndexDocument, VectorIndex, META_MOVIE_DATA, META_MOVIE_NAME};
use crate::catalog::{describe_movie, CatalogClient, CatalogQuery, Movie};
use sdk::errors::EngineError;
use std::collections::BTreeMap;

const PAGE_SIZE: u32 = 50;

fn to_document(movie: &Movie) -> Option<IndexDocument> {
    let text = movie.description.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(IndexDocument {
        id: movie.id.to_string(),
        text: text.to_string(),
        metadata: BTreeMap::from([
            (META_MOVIE_NAME.to_string(), movie.title().to_string()),
            (META_MOVIE_DATA.to_string(), describe_movie(movie)),
        ]),
    })
}

/// Load up to `limit` movies of the catalog's top-250 list into the index.
///
/// Movies without a description are skipped. Returns the number of
/// documents added.
pub async fn populate_top250(
    catalog: &CatalogClient,
    index: &dyn VectorIndex,
    limit: usize,
) -> Result<usize, EngineError> {
    let mut added = 0;
    let mut page = 1u32;

    while added < limit {
        let query = CatalogQuery::movie_defaults(PAGE_SIZE)
            .with("lists", "top250")
            .with("page", page.to_string());
        let movies = catalog.list_movies(&query).await?;
        if movies.is_empty() {
            break;
        }

        let documents: Vec<IndexDocument> = movies
            .iter()
            .filter_map(to_document)
            .take(limit - added)
            .collect();
        added += index.add(documents).await?;

        tracing::info!("Indexed catalog page {} ({} documents so far)", page, added);
        page += 1;
    }

    Ok(added)
}
