pub mod post;

pub use post::{
    background_url, decode_share_url, parse_timestamp, post_id, strip_query, FileAttachment, Post,
};
