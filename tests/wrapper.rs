mod support;

use std::sync::Arc;

use btree_index::{Error, NaturalOrder, OpContext, StoreDescriptor, TransactionMode, TransactionWrapper, Tree};
use support::{MemoryRepository, MemoryTransaction, RecordingTracker};
use tokio::sync::Mutex;

fn new_wrapper(
	mode: TransactionMode,
) -> TransactionWrapper<i32, String, MemoryRepository<i32, String>, RecordingTracker<i32, String>, NaturalOrder<i32>, MemoryTransaction> {
	let descriptor = StoreDescriptor::builder().build().unwrap();
	let tree = Tree::new(descriptor, MemoryRepository::new(), RecordingTracker::new(), NaturalOrder::new());
	TransactionWrapper::new(Arc::new(Mutex::new(tree)), MemoryTransaction::new(mode))
}

#[tokio::test]
async fn operations_before_begin_roll_back_and_error() {
	let ctx = OpContext::background();
	let wrapper = new_wrapper(TransactionMode::ForWriting);

	let result = wrapper.add(&ctx, 1, "x".to_string()).await;
	assert!(matches!(result, Err(Error::TransactionNotBegun)));
	assert_eq!(wrapper.transaction().rollbacks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn writer_operation_in_reader_mode_rolls_back_and_errors() {
	let ctx = OpContext::background();
	let wrapper = new_wrapper(TransactionMode::ForReading);
	wrapper.begin(&ctx, TransactionMode::ForReading).await.unwrap();

	let result = wrapper.add(&ctx, 1, "x".to_string()).await;
	assert!(matches!(result, Err(Error::TransactionNotWritable)));
	assert_eq!(wrapper.transaction().rollbacks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn reader_operation_is_allowed_once_begun() {
	let ctx = OpContext::background();
	let wrapper = new_wrapper(TransactionMode::ForReading);
	wrapper.begin(&ctx, TransactionMode::ForReading).await.unwrap();

	assert!(!wrapper.find(&ctx, &1).await.unwrap());
	assert!(wrapper.transaction().rollbacks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn writer_operations_succeed_once_begun_for_writing() {
	let ctx = OpContext::background();
	let wrapper = new_wrapper(TransactionMode::ForWriting);
	wrapper.begin(&ctx, TransactionMode::ForWriting).await.unwrap();

	assert!(wrapper.add(&ctx, 1, "x".to_string()).await.unwrap());
	assert_eq!(wrapper.count().await, 1);
	assert!(wrapper.remove(&ctx, &1).await.unwrap());
	assert_eq!(wrapper.count().await, 0);
	assert!(wrapper.transaction().rollbacks.lock().unwrap().is_empty());

	wrapper.commit(&ctx).await.unwrap();
}
