use aws_sdk_sqs::error::SdkError;
use aws_sdk_sqs::operation::change_message_visibility::ChangeMessageVisibilityError;
use aws_sdk_sqs::operation::create_queue::CreateQueueError;
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::operation::get_queue_url::GetQueueUrlError;
use aws_sdk_sqs::operation::list_queues::ListQueuesError;
use aws_sdk_sqs::operation::receive_message::ReceiveMessageError;
use aws_sdk_sqs::operation::send_message::SendMessageError;
use thiserror::Error;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Error types for queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker could not be reached while opening a session
    #[error("Failed to connect to queue server: {0}")]
    Connect(#[from] SdkError<ListQueuesError>),

    /// Error declaring a queue
    #[error("Failed to create queue: {0}")]
    CreateQueue(#[from] SdkError<CreateQueueError>),

    /// Error resolving a queue URL
    #[error("Failed to resolve queue URL: {0}")]
    GetQueueUrl(#[from] SdkError<GetQueueUrlError>),

    /// Error receiving messages from SQS
    #[error("Failed to receive messages from SQS: {0}")]
    ReceiveMessage(#[from] SdkError<ReceiveMessageError>),

    /// Error sending message to SQS
    #[error("Failed to send message to SQS: {0}")]
    SendMessage(#[from] SdkError<SendMessageError>),

    /// Error deleting message from SQS
    #[error("Failed to delete message from SQS: {0}")]
    DeleteMessage(#[from] SdkError<DeleteMessageError>),

    /// Error returning a message to the queue
    #[error("Failed to release message back to SQS: {0}")]
    ChangeVisibility(#[from] SdkError<ChangeMessageVisibilityError>),

    /// Error serializing a reply to JSON
    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message could not be built
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// An operation was attempted before `connect`
    #[error("Queue session is not connected")]
    NotConnected,

    /// `next_event` was called before `register_consumer`
    #[error("No consumer registered on this session")]
    NotConsuming,

    /// The broker returned a response without a queue URL
    #[error("Queue server returned no URL for queue {0}")]
    MissingQueueUrl(String),
}
