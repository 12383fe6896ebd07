//! Prompt text for the two completion calls of a turn.

/// System instruction for the search-query rewrite.
pub const REFORMULATE_SYSTEM: &str = "You are a helpful assistant whose primary goal is to \
rewrite the user's query into a web search query that retrieves the knowledge needed to answer it.";

/// System instruction for the cited answer.
pub const ANSWER_SYSTEM: &str = "You are a helpful assistant who is an expert at answering \
user queries from cited context: search results given as /citation number/ /website link/ \
/page text/.";

/// Stand-in for the context block when no page could be retrieved.
pub const EMPTY_CONTEXT: &str = "(no sources could be retrieved for this query)";

/// Wrap the raw user query in the search-rewrite instruction.
pub fn reformulate_prompt(query: &str) -> String {
    format!(
        "Rewrite the user query below as a web search query. Follow these conditions:\n\
         - Produce a single line suitable for a search engine.\n\
         - The query may refer to earlier messages. Resolve such references using the whole \
         conversation history.\n\
         - Return only the search query.\n\
         \n\
         User Query:\n\
         {query}\n"
    )
}

/// Build the cited-answer instruction around the rendered context block.
pub fn answer_prompt(query: &str, context_block: &str) -> String {
    let context_block = if context_block.trim().is_empty() {
        EMPTY_CONTEXT
    } else {
        context_block
    };

    format!(
        "Provide a relevant, informative response to the user query using the given context.\n\
         \n\
         - Answer directly without referring the user to any external links.\n\
         - Use an unbiased, journalistic tone and do not repeat text.\n\
         - Cite every claim with the bracketed number of its source, like [1] or [2]. \
         Write only the number inside the brackets: never the word citation and never the URL.\n\
         \n\
         Context Block:\n\
         {context_block}\n\
         \n\
         User Query:\n\
         {query}\n"
    )
}
