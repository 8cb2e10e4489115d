//! Conversions between transfer objects and entities.

use crate::error::CatalogResult;
use crate::image;
use crate::models::{
    Category, CategoryDto, CreateCategoryDto, CreateProductDto, Product, ProductDto,
    UpdateCategoryDto, UpdateProductDto,
};

impl From<&Category> for CategoryDto {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

impl From<Category> for CategoryDto {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

/// New category with a trimmed name and id 0
impl From<CreateCategoryDto> for Category {
    fn from(dto: CreateCategoryDto) -> Self {
        Category::new(0, dto.name.trim())
    }
}

impl From<UpdateCategoryDto> for Category {
    fn from(dto: UpdateCategoryDto) -> Self {
        Category::new(dto.id, dto.name.trim())
    }
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            image: product.image.as_deref().map(image::encode),
            categories: product.categories.into_iter().map(CategoryDto::from).collect(),
        }
    }
}

/// Build an unsaved product. Categories are attached by the caller.
pub fn product_from_create(dto: &CreateProductDto) -> CatalogResult<Product> {
    Ok(Product {
        id: 0,
        name: dto.name.trim().to_string(),
        description: dto.description.clone(),
        image: image::decode(dto.image.as_deref())?,
        categories: Vec::new(),
    })
}

/// Copy the scalar fields of `dto` onto a tracked product.
/// `categories` is left alone; reconciliation owns it.
pub fn apply_update(dto: &UpdateProductDto, product: &mut Product) -> CatalogResult<()> {
    product.name = dto.name.trim().to_string();
    product.description = dto.description.clone();
    product.image = image::decode(dto.image.as_deref())?;
    Ok(())
}
