//! In-memory store.
//!
//! Every operation takes the table lock once, so check-and-insert sequences
//! (uniqueness, references) are atomic just like the constraints in the
//! `PostgreSQL` schema.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use emporium_core::{
    CategoryId, Email, OrderId, Pagination, ProductId, Role, Slug, Sort, SortDirection, UserId,
};

use super::{
    CategoryStore, OrderStore, Page, ProductStore, RepositoryError, Store, UserStore,
};
use crate::models::{
    Category, CategoryChanges, CategoryFilter, CategorySort, NewCategory, NewOrder, NewProduct,
    NewUser, Order, OrderFilter, OrderSort, OrderStatus, Product, ProductChanges, ProductFilter,
    ProductSort, UpdatedProduct, User,
};

#[derive(Debug, Default)]
struct Tables {
    last_id: i32,
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    orders: Vec<Order>,
}

impl Tables {
    const fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn category_taken(&self, name: &str, slug: &Slug, except: Option<CategoryId>) -> bool {
        let name = name.to_lowercase();
        self.categories
            .iter()
            .filter(|c| Some(c.id) != except)
            .any(|c| c.name.to_lowercase() == name || &c.slug == slug)
    }

    fn category_exists(&self, id: CategoryId) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// Store that keeps everything in process memory.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort, count and slice a filtered collection.
fn sort_and_page<T: Clone>(
    mut items: Vec<&T>,
    direction: SortDirection,
    page: Pagination,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Page<T> {
    items.sort_by(|a, b| {
        let ord = cmp(a, b);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    let total = items.len() as u64;
    let rows = page.slice(&items).iter().map(|item| (*item).clone()).collect();
    (rows, total)
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("User already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(tables.next_id()),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn set_user_role(
        &self,
        email: &Email,
        role: Role,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.write();
        Ok(tables
            .users
            .iter_mut()
            .find(|u| &u.email == email)
            .map(|user| {
                user.role = role;
                user.updated_at = Utc::now();
                user.clone()
            }))
    }
}

impl CategoryStore for MemoryStore {
    async fn create_category(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        let mut tables = self.tables.write();
        if tables.category_taken(&category.name, &category.slug, None) {
            return Err(RepositoryError::Conflict("Category already exists".to_owned()));
        }

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(tables.next_id()),
            name: category.name,
            slug: category.slug,
            description: category.description,
            is_active: category.is_active,
            created_by: category.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn list_categories(
        &self,
        filter: &CategoryFilter,
        sort: Sort<CategorySort>,
        page: Pagination,
    ) -> Result<Page<Category>, RepositoryError> {
        let tables = self.tables.read();
        let matching = tables.categories.iter().filter(|c| filter.matches(c)).collect();

        Ok(sort_and_page(matching, sort.direction, page, |a, b| {
            match sort.field {
                CategorySort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                CategorySort::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then(a.id.cmp(&b.id))
        }))
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.categories.iter().find(|c| &c.slug == slug).cloned())
    }

    async fn update_category(
        &self,
        slug: &Slug,
        changes: CategoryChanges,
    ) -> Result<Option<Category>, RepositoryError> {
        let mut tables = self.tables.write();
        let Some(current) = tables.categories.iter().find(|c| &c.slug == slug) else {
            return Ok(None);
        };

        let id = current.id;
        let name = changes.name.as_deref().unwrap_or(&current.name);
        let new_slug = changes.slug.as_ref().unwrap_or(&current.slug);
        if tables.category_taken(name, new_slug, Some(id)) {
            return Err(RepositoryError::Conflict("Category already exists".to_owned()));
        }

        Ok(tables
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .map(|category| {
                changes.apply(category, Utc::now());
                category.clone()
            }))
    }

    async fn delete_category(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        let Some(id) = tables
            .categories
            .iter()
            .find(|c| &c.slug == slug)
            .map(|c| c.id)
        else {
            return Ok(false);
        };

        if tables.products.iter().any(|p| p.category_id == id) {
            return Err(RepositoryError::InvalidReference(
                "Category still has products".to_owned(),
            ));
        }

        tables.categories.retain(|c| c.id != id);
        Ok(true)
    }
}

impl ProductStore for MemoryStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.category_exists(product.category_id) {
            return Err(RepositoryError::InvalidReference("Category not found".to_owned()));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(tables.next_id()),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category_id: product.category_id,
            image: product.image,
            created_by: product.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        sort: Sort<ProductSort>,
        page: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let tables = self.tables.read();
        let matching = tables.products.iter().filter(|p| filter.matches(p)).collect();

        Ok(sort_and_page(matching, sort.direction, page, |a, b| {
            match sort.field {
                ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                ProductSort::Price => a.price.cmp(&b.price),
                ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
            }
            .then(a.id.cmp(&b.id))
        }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<UpdatedProduct>, RepositoryError> {
        let mut tables = self.tables.write();
        if let Some(category_id) = changes.category_id
            && !tables.category_exists(category_id)
        {
            return Err(RepositoryError::InvalidReference("Category not found".to_owned()));
        }

        Ok(tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .map(|product| {
                let replaced_image = changes.apply(product, Utc::now());
                UpdatedProduct {
                    product: product.clone(),
                    replaced_image,
                }
            }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables.write();
        let Some(index) = tables.products.iter().position(|p| p.id == id) else {
            return Ok(None);
        };

        let product = tables.products.remove(index);

        // Order items keep their snapshot but lose the link
        for item in tables.orders.iter_mut().flat_map(|o| o.items.iter_mut()) {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }

        Ok(Some(product))
    }
}

impl OrderStore for MemoryStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.users.iter().any(|u| u.id == order.user_id) {
            return Err(RepositoryError::InvalidReference("User not found".to_owned()));
        }
        let missing_product = order
            .items
            .iter()
            .filter_map(|item| item.product_id)
            .any(|id| !tables.products.iter().any(|p| p.id == id));
        if missing_product {
            return Err(RepositoryError::InvalidReference("Product not found".to_owned()));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(tables.next_id()),
            user_id: order.user_id,
            items: order.items,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            totals: order.totals,
            status: OrderStatus::default(),
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        sort: Sort<OrderSort>,
        page: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let tables = self.tables.read();
        let matching = tables.orders.iter().filter(|o| filter.matches(o)).collect();

        Ok(sort_and_page(matching, sort.direction, page, |a, b| {
            match sort.field {
                OrderSort::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderSort::TotalPrice => a.totals.total_price.cmp(&b.totals.total_price),
            }
            .then(a.id.cmp(&b.id))
        }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables.write();
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status.clone();
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write();
        let before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        Ok(tables.orders.len() < before)
    }
}
