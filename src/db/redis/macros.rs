/// Read-through caching around a provider call.
///
/// With `Some(cache)`, returns the cached value on a hit; otherwise awaits the
/// block, queues the result for storage and returns it. With `None`, simply
/// awaits the block. Errors from the block propagate through `?`, so it must
/// be used inside a function returning `AppResult`.
///
/// # Arguments
/// * `$cache`: an `Option<&Cache>`.
/// * `$key`: the `CacheKey` for the value.
/// * `$ttl`: time-to-live in seconds.
/// * `$block`: a future producing `AppResult<T>`.
///
/// # Example
/// ```rust,ignore
/// cached!(self.cache.as_ref(), key, DETAILS_CACHE_TTL, async move {
///     self.fetch_details(kind, id, language).await
/// })
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache {
            Some(cache) => match cache.get_from_cache(&$key).await {
                Some(hit) => Ok(hit),
                None => {
                    let value = $block.await?;
                    cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
            },
            None => $block.await,
        }
    }};
}
