use super::errors::ValidationError;
use super::value_objects::OrderItem;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrder {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
}

impl CreateOrder {
    pub fn new(user_id: i64, items: Vec<OrderItem>) -> Self {
        Self { user_id, items }
    }

    /// Local checks that must pass before the catalog is touched.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id <= 0 {
            return Err(ValidationError::InvalidUserId(self.user_id));
        }

        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }

        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ValidationError::NonPositiveQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_command_passes() {
        let cmd = CreateOrder::new(1, vec![OrderItem::new(1, 2), OrderItem::new(2, 1)]);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_empty_items_rejected() {
        let cmd = CreateOrder::new(1, vec![]);
        assert_eq!(cmd.validate(), Err(ValidationError::EmptyItems));
    }

    #[test]
    fn test_zero_and_negative_quantities_rejected() {
        for quantity in [0, -3] {
            let cmd = CreateOrder::new(1, vec![OrderItem::new(1, 1), OrderItem::new(9, quantity)]);
            assert_eq!(
                cmd.validate(),
                Err(ValidationError::NonPositiveQuantity { product_id: 9, quantity })
            );
        }
    }

    #[test]
    fn test_invalid_user_rejected() {
        let cmd = CreateOrder::new(0, vec![OrderItem::new(1, 1)]);
        assert_eq!(cmd.validate(), Err(ValidationError::InvalidUserId(0)));
    }
}
