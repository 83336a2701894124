pub mod client;

pub use client::{
    ApiClient, ApiError, ArtworkInfo, ChatTurn, FollowupReply, FollowupRequest, RecognitionApi,
};
